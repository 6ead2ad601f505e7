use crate::Overrides;
use anyhow::{Context, Result};
use colored::Colorize;
use implicit_rec_als::factor_store::SNAPSHOT_FILE;
use implicit_rec_als::{
    ALSConfig, FactorSource, FactorStore, ItemCatalog, RatingsFileStore, RecommendRequest,
    RecommendationPipeline, SnapshotFactorStore, TsvFactorStore, UserRecommendations,
};
use implicit_rec_core::{ConfigLoader, DataConfig, FactorFormat, LogConfig};
use serde::Serialize;
use std::time::Instant;

/// Effective configuration after environment and flag overrides
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub als: ALSConfig,
    pub data: DataConfig,
    pub log: LogConfig,
}

impl Settings {
    pub fn resolve(overrides: &Overrides) -> Result<Self> {
        let settings = Self {
            als: ALSConfig::from_env()?,
            data: DataConfig::from_env()?,
            log: LogConfig::from_env()?,
        }
        .with_overrides(overrides);

        settings.als.validate()?;
        settings.data.validate()?;
        settings.log.validate()?;
        Ok(settings)
    }

    fn with_overrides(mut self, overrides: &Overrides) -> Self {
        if let Some(path) = &overrides.ratings {
            self.data.ratings_path = path.clone();
        }
        if let Some(path) = &overrides.catalog {
            self.data.catalog_path = path.clone();
        }
        if let Some(dir) = &overrides.factor_dir {
            self.data.factor_dir = dir.clone();
        }
        if let Some(format) = overrides.format {
            self.data.factor_format = format;
        }
        if let Some(factors) = overrides.factors {
            self.als.latent_factors = factors;
        }
        if let Some(iterations) = overrides.iterations {
            self.als.iterations = iterations;
        }
        if let Some(regularization) = overrides.regularization {
            self.als.regularization = regularization;
        }
        if let Some(alpha) = overrides.alpha {
            self.als.alpha = alpha;
        }
        if overrides.seed.is_some() {
            self.als.seed = overrides.seed;
        }
        if overrides.parallel {
            self.als.parallel = true;
        }
        if let Some(format) = overrides.log_format {
            self.log.format = format;
        }
        self
    }
}

fn factor_store(settings: &Settings) -> Box<dyn FactorStore> {
    match settings.data.factor_format {
        FactorFormat::Tsv => Box::new(TsvFactorStore::new(&settings.data.factor_dir)),
        FactorFormat::Snapshot => Box::new(
            SnapshotFactorStore::new(settings.data.factor_dir.join(SNAPSHOT_FILE))
                .with_config(settings.als.clone()),
        ),
    }
}

fn build_pipeline(settings: &Settings) -> Result<RecommendationPipeline> {
    let pipeline = RecommendationPipeline::new(
        settings.als.clone(),
        Box::new(RatingsFileStore::new(&settings.data.ratings_path)),
        factor_store(settings),
    );

    let catalog_path = &settings.data.catalog_path;
    if !catalog_path.is_file() {
        tracing::warn!(
            path = %catalog_path.display(),
            "Item catalog not found; recommendations will have no titles"
        );
        return Ok(pipeline);
    }

    let catalog = ItemCatalog::from_pipe_file(catalog_path)
        .with_context(|| format!("Failed to load item catalog {}", catalog_path.display()))?;
    Ok(pipeline.with_catalog(Box::new(catalog)))
}

pub fn fit(settings: &Settings) -> Result<()> {
    println!("{}", "Fitting factors...".cyan().bold());

    let pipeline = build_pipeline(settings)?;
    let data = pipeline.load_data().with_context(|| {
        format!(
            "Failed to load ratings from {}",
            settings.data.ratings_path.display()
        )
    })?;

    println!(
        "  {} {} users x {} items, {} interactions ({:.3}% dense)",
        "→".cyan(),
        data.matrix.num_users(),
        data.matrix.num_items(),
        data.matrix.nnz(),
        data.matrix.density() * 100.0
    );

    let started = Instant::now();
    let factors = pipeline.fit(&data)?;

    println!(
        "  {} {} latent factors, {} iterations in {:.2?}",
        "→".cyan(),
        factors.latent_factors(),
        settings.als.iterations,
        started.elapsed()
    );
    println!(
        "\n{} {}",
        "Factors saved to".green().bold(),
        settings.data.factor_dir.display()
    );

    Ok(())
}

pub fn recommend(
    settings: &Settings,
    user: u64,
    k: usize,
    include_seen: bool,
    refit: bool,
    json: bool,
) -> Result<()> {
    let pipeline = build_pipeline(settings)?;
    let result = pipeline.recommend(RecommendRequest {
        user_id: user,
        k,
        include_seen,
        refit,
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_table(&result);
    }

    Ok(())
}

fn print_table(result: &UserRecommendations) {
    let source = match result.source {
        FactorSource::Loaded => "saved factors".white(),
        FactorSource::Fitted => "freshly fitted factors".yellow(),
    };
    println!(
        "\n{} {} ({})\n",
        "Recommendations for user".cyan().bold(),
        result.user_id.to_string().white().bold(),
        source
    );

    println!("  {:<5} {:<8} {:>10}  {}", "Rank", "Item", "Score", "Title");
    println!("  {}", "-".repeat(60));

    for (rank, item) in result.items.iter().enumerate() {
        let title = item.title.as_deref().unwrap_or("-");
        let score = if item.score.is_finite() {
            format!("{:.4}", item.score)
        } else {
            "seen".to_string()
        };
        let line = format!(
            "  {:<5} {:<8} {:>10}  {}",
            rank + 1,
            item.item_id,
            score,
            title
        );
        if item.seen {
            println!("{}", line.dimmed());
        } else {
            println!("{}", line);
        }
    }

    if result.truncated {
        println!(
            "\n{} only {} items exist; returned all of them",
            "Note:".yellow().bold(),
            result.items.len()
        );
    }
    if result.backfilled > 0 {
        println!(
            "\n{} {} slot(s) filled with already seen items",
            "Note:".yellow().bold(),
            result.backfilled
        );
    }
}

pub fn config(settings: &Settings) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(settings)?);
    Ok(())
}
