use std::path::PathBuf;

use ruraliq_core::config::ClientConfig;
use ruraliq_core::{GeoPoint, ReportDraft, SubmitOutcome};

use crate::commands::common::{resolve_description, resolve_image_path, Session};
use crate::error::CliError;

pub struct CaptureArgs {
    pub village: String,
    pub lat: Option<f64>,
    pub long: Option<f64>,
    pub image: Option<PathBuf>,
    pub description: Vec<String>,
}

pub fn build_draft(args: CaptureArgs) -> Result<ReportDraft, CliError> {
    let description = resolve_description(&args.description)?;
    let mut draft = ReportDraft::new(args.village, description);

    if let (Some(lat), Some(long)) = (args.lat, args.long) {
        draft = draft.with_location(GeoPoint::new(lat, long)?);
    }
    if let Some(image) = args.image {
        draft = draft.with_image(resolve_image_path(&image)?);
    }

    Ok(draft)
}

pub async fn run_capture(args: CaptureArgs, config: ClientConfig) -> Result<SubmitOutcome, CliError> {
    let report = build_draft(args)?.capture()?;
    let session = Session::open_probed(config).await?;
    let outcome = session.coordinator.submit_report(&report).await?;

    match &outcome {
        SubmitOutcome::Delivered { server_id } => println!("delivered {server_id}"),
        SubmitOutcome::Queued { client_id } => println!("queued {client_id}"),
    }
    Ok(outcome)
}
