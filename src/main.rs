use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;
use trend_coach::application::{AnalysisOptions, AnalysisRequest};
use trend_coach::config::{LoggingSettings, Settings};
use trend_coach::domain::{AnalysisError, DateRange, SubjectId};
use trend_coach::{Application, Error};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::new().context("loading settings")?;
    init_tracing(&settings.logging);

    let request = cli.into_request()?;
    info!("Starting trend coach");

    let app = Application::from_settings(settings).await?;
    let output = run(&app, &request).await?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[instrument(skip_all)]
async fn run(
    app: &Application,
    request: &AnalysisRequest,
) -> Result<trend_coach::application::AnalysisOutput> {
    app.run(request).await.map_err(|error| {
        match error.as_analysis().map(AnalysisError::user_message) {
            Some(message) => anyhow::anyhow!("{message} ({error})"),
            None => error.into(),
        }
    })
}

/// Logs go to stderr so stdout carries only the JSON report
fn init_tracing(logging: &LoggingSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}

/// Coaching trend analysis over a subject's call records
#[derive(Debug, Parser)]
#[command(name = "trend_coach")]
#[command(version)]
#[command(about = "Analyze coaching trends for a subject, optionally against a second period")]
struct Cli {
    /// Subject whose calls are analyzed
    subject: String,
    /// First day of the primary period (YYYY-MM-DD)
    from: NaiveDate,
    /// Last day of the primary period (YYYY-MM-DD)
    to: NaiveDate,
    /// First day of the comparison period
    #[arg(long, requires = "compare_to")]
    compare_from: Option<NaiveDate>,
    /// Last day of the comparison period
    #[arg(long, requires = "compare_from")]
    compare_to: Option<NaiveDate>,
    /// Recompute even when a cached report exists
    #[arg(long)]
    force_refresh: bool,
}

impl Cli {
    fn into_request(self) -> Result<AnalysisRequest> {
        let comparison = match (self.compare_from, self.compare_to) {
            (Some(from), Some(to)) => Some(DateRange::whole_days(from, to)?),
            _ => None,
        };
        Ok(AnalysisRequest {
            subject: SubjectId::try_new(self.subject.clone())
                .map_err(|_| Error::invalid_input("subject"))
                .with_context(|| format!("unusable subject id {:?}", self.subject))?,
            primary: DateRange::whole_days(self.from, self.to)?,
            comparison,
            options: AnalysisOptions {
                force_refresh: self.force_refresh,
            },
        })
    }
}
