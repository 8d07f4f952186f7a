use anyhow::Result;
use clap::Parser;
use common::{TotalStats, UsageAggregate, UserStats};
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "usage-report")]
struct Args {
    #[arg(long, default_value = "config")]
    config_file: String,

    /// Only report this user's usage.
    #[arg(long)]
    user: Option<String>,

    /// Print the same JSON the HTTP stats endpoints return.
    #[arg(long)]
    json: bool,
}

#[derive(Deserialize)]
struct ReportConfig {
    #[serde(default = "default_database_url")]
    database_url: String,
}

fn default_database_url() -> String {
    "sqlite://usage_stats.db".to_string()
}

fn load_config(config_file: &str) -> Result<ReportConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(config_file).required(false))
        .add_source(config::Environment::default())
        .build()?;
    let cfg: ReportConfig = settings.try_deserialize()?;
    Ok(cfg)
}

fn render_table(rows: &[UsageAggregate]) -> String {
    if rows.is_empty() {
        return "no usage recorded\n".to_string();
    }
    let width = rows
        .iter()
        .map(|r| r.action.len())
        .max()
        .unwrap_or(0)
        .max("action".len());
    let mut out = format!(
        "{:<width$}  {:>8}  {:<20}  {:<20}\n",
        "action", "count", "first_use", "last_use"
    );
    for row in rows {
        out.push_str(&format!(
            "{:<width$}  {:>8}  {:<20}  {:<20}\n",
            row.action,
            row.count,
            row.first_use.format("%Y-%m-%d %H:%M:%S").to_string(),
            row.last_use.format("%Y-%m-%d %H:%M:%S").to_string(),
        ));
    }
    out
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("usage_report=info"));

    let args = Args::parse();
    dotenvy::dotenv().ok();
    let cfg = load_config(&args.config_file)?;

    let pool = db::init_pool(&cfg.database_url).await?;
    db::create_usage_table(&pool).await?;

    match args.user {
        Some(user_id) => {
            let stats = db::usage_by_user(&pool, &user_id).await?;
            log::info!("{} action(s) recorded for {}", stats.len(), user_id);
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&UserStats { user_id, stats })?
                );
            } else {
                print!("{}", render_table(&stats));
            }
        }
        None => {
            let total_stats = db::usage_total(&pool).await?;
            log::info!("{} action(s) recorded in total", total_stats.len());
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&TotalStats { total_stats })?
                );
            } else {
                print!("{}", render_table(&total_stats));
            }
        }
    }

    pool.close().await;
    Ok(())
}
