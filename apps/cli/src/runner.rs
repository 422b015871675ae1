//! Wires real collaborators into the pipeline for one run.

use landingsync_core::{
    PagePipeline, PipelineSettings, ProgressReporter, WebhookOutcome, WebhookProcessor,
    parse_webhook_body, validate_request,
};
use landingsync_crm::HubSpotClient;
use landingsync_llm::OpenAiGenerator;
use landingsync_publisher::DudaClient;
use landingsync_shared::{AppConfig, PageRequest, PageRunResult, Result, RunConfig};
use tracing::info;

/// Run the pipeline for a direct request.
///
/// The request is validated before any credential is resolved, so a bad
/// request never turns into a configuration error.
pub(crate) async fn run_generate(
    app: &AppConfig,
    request: &PageRequest,
    progress: &dyn ProgressReporter,
) -> Result<PageRunResult> {
    validate_request(request)?;

    let run_config = RunConfig::resolve(app, false)?;
    let generator = OpenAiGenerator::from_run_config(&run_config)?;
    let platform = DudaClient::from_run_config(&run_config)?;
    let pipeline = PagePipeline::new(&generator, &platform, PipelineSettings::from_config(app));

    pipeline.run(request, progress).await
}

/// Process a raw CRM webhook delivery.
pub(crate) async fn run_webhook(
    app: &AppConfig,
    body: &str,
    progress: &dyn ProgressReporter,
) -> Result<WebhookOutcome> {
    let event = parse_webhook_body(body)?;

    let run_config = RunConfig::resolve(app, true)?;
    let generator = OpenAiGenerator::from_run_config(&run_config)?;
    let platform = DudaClient::from_run_config(&run_config)?;
    let crm = HubSpotClient::from_run_config(&run_config)?;
    let pipeline = PagePipeline::new(&generator, &platform, PipelineSettings::from_config(app));
    let processor = WebhookProcessor::new(&crm, &pipeline, app.defaults.default_num_pages);

    let target = processor.resolve_target(&event).await?;
    info!(contact_id = %target.contact_id, "processing webhook");
    processor
        .process_contact_update(&target.contact_id, target.deal_id.as_deref(), progress)
        .await
}
