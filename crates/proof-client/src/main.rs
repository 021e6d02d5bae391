//! Proof-of-usage evaluation CLI
//!
//! Reads free-text wallet input (arguments or stdin), resolves ENS names,
//! runs the tiered evaluation and prints rows plus a run summary as JSON to
//! stdout. Logs go to stderr so the output stays pipeable.
//!
//! ```text
//! proof-eval --campaign <id> [--window <type>] [--criteria <id>] \
//!            [--mock <count>] [wallets...]
//! ```

use std::io::Read;

use anyhow::{bail, Context};
use proof_core::{
    normalize_wallet_input, DataSource, RunSummary, UsageWindow, UsageWindowType,
    WalletResultRow,
};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use proof_client::ens::{build_wallet_plan, EnsBatchOutcome, UnresolvedInput};
use proof_client::{AppConfig, EvaluationRequest, Orchestrator};

#[derive(Debug)]
struct CliArgs {
    campaign_id: String,
    window_type: UsageWindowType,
    criteria_set_id: Option<String>,
    mock_count: Option<usize>,
    wallet_tokens: Vec<String>,
}

fn parse_args() -> anyhow::Result<CliArgs> {
    let mut campaign_id = None;
    let mut window_type = UsageWindowType::Last30Days;
    let mut criteria_set_id = None;
    let mut mock_count = None;
    let mut wallet_tokens = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--campaign" => {
                campaign_id = Some(args.next().context("--campaign requires a value")?);
            }
            "--window" => {
                let value = args.next().context("--window requires a value")?;
                window_type = value.parse()?;
            }
            "--criteria" => {
                criteria_set_id = Some(args.next().context("--criteria requires a value")?);
            }
            "--mock" => {
                let value = args.next().context("--mock requires a value")?;
                mock_count = Some(value.parse().context("--mock expects a number")?);
            }
            other if other.starts_with("--") => bail!("unknown flag: {other}"),
            other => wallet_tokens.push(other.to_string()),
        }
    }

    Ok(CliArgs {
        campaign_id: campaign_id.context("--campaign is required")?,
        window_type,
        criteria_set_id,
        mock_count,
        wallet_tokens,
    })
}

/// JSON report printed to stdout.
#[derive(Serialize)]
struct CliReport {
    campaign_id: String,
    window: UsageWindow,
    source: DataSource,
    rows: Vec<WalletResultRow>,
    summary: RunSummary,
    invalid_input: Vec<String>,
    unresolved_ens: Vec<String>,
    excluded: Vec<UnresolvedInput>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("proof_client=info,proof_eval=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = parse_args()?;

    let config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Using default configuration");
        AppConfig::default()
    });
    tracing::info!(
        api_base_url = %config.api.base_url,
        concurrency = config.evaluation.concurrency,
        "Configuration loaded"
    );

    let orchestrator = Orchestrator::new(&config);
    let window = UsageWindow::from_type(args.window_type, chrono::Utc::now().timestamp())?;

    // Assemble the raw input: --mock pulls sample wallets, otherwise tokens
    // come from the arguments or stdin.
    let raw_input = if let Some(count) = args.mock_count {
        let wallets = orchestrator
            .fetch_mock_wallets(&args.campaign_id, count)
            .await
            .context("failed to fetch mock wallets")?;
        tracing::info!(count = wallets.len(), "Fetched mock wallets");
        wallets.join("\n")
    } else if args.wallet_tokens.is_empty() {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read wallets from stdin")?;
        buffer
    } else {
        args.wallet_tokens.join("\n")
    };

    let normalized = normalize_wallet_input(&raw_input);
    if normalized.addresses.is_empty() && normalized.ens_names.is_empty() {
        bail!("no valid wallet addresses or ENS names in input");
    }
    tracing::info!(
        addresses = normalized.addresses.len(),
        ens_names = normalized.ens_names.len(),
        invalid = normalized.invalid.len(),
        "Input normalized"
    );

    let handle = orchestrator.start_run();
    {
        let handle = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Cancellation requested");
                handle.cancel();
            }
        });
    }

    // Resolve ENS names ahead of evaluation; unresolved names are reported,
    // not fatal.
    let ens_outcome = if normalized.ens_names.is_empty() {
        EnsBatchOutcome {
            resolutions: Vec::new(),
            unresolved: Vec::new(),
        }
    } else {
        let gateway = orchestrator.ens_gateway();
        gateway
            .resolve_batch(&normalized.ens_names, handle.token())
            .await?
    };

    let plan = build_wallet_plan(&normalized.inputs, &ens_outcome.resolutions);
    if plan.wallets.is_empty() {
        bail!("no wallets left to evaluate after ENS resolution");
    }

    let mut request = EvaluationRequest::new(plan.wallets, args.campaign_id.clone(), window);
    request.criteria_set_id = args.criteria_set_id;
    request.meta = plan.meta;

    let total = request.wallets.len();
    let mut on_progress = move |done: usize| {
        tracing::info!(done, total, "Evaluation progress");
    };
    let outcome = orchestrator
        .evaluate(&request, &handle, Some(&mut on_progress))
        .await?;

    tracing::info!(
        source = ?outcome.source,
        rows = outcome.rows.len(),
        verified = outcome.summary.verified_true,
        "Evaluation complete"
    );

    let report = CliReport {
        campaign_id: args.campaign_id,
        window,
        source: outcome.source,
        summary: outcome.summary,
        rows: outcome.rows,
        invalid_input: normalized.invalid,
        unresolved_ens: ens_outcome.unresolved,
        excluded: plan.invalid,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
