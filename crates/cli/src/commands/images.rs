//! Image upload and listing.

use std::path::PathBuf;

use skin_one_client::{AppContext, ImageFile, UploadError};
use skin_one_core::Stage;

use super::{CliError, print_json};

/// Upload `paths` as a batch, a staged batch or a single image.
pub async fn upload(
    ctx: &AppContext,
    paths: &[PathBuf],
    stage: Option<Stage>,
    single: bool,
) -> Result<(), CliError> {
    if single {
        let [path] = paths else {
            return Err(CliError::SingleNeedsOneFile(paths.len()));
        };
        let file = ImageFile::from_path(path).await?;
        let response = ctx.api().upload_single(file).await?;
        return print_json(&response);
    }

    let total = paths.len();
    let mut files = Vec::with_capacity(total);
    let mut skipped = Vec::new();
    for path in paths {
        match ImageFile::from_path(path).await {
            Ok(file) => files.push(file),
            Err(err @ UploadError::TooLarge { .. }) => skipped.push(err),
            Err(err) => return Err(err.into()),
        }
    }
    if files.is_empty() {
        report_skipped(&skipped, total);
        return Err(UploadError::NoValidFiles.into());
    }

    match stage {
        Some(stage) => {
            let outcome = ctx.api().upload_batch_with_stage(stage, files).await?;
            skipped.extend(outcome.skipped);
            report_skipped(&skipped, total);
            print_json(&outcome.response)
        }
        None => {
            let outcome = ctx.api().upload_batch(files).await?;
            skipped.extend(outcome.skipped);
            report_skipped(&skipped, total);
            print_json(&outcome.response)
        }
    }
}

fn report_skipped(skipped: &[UploadError], total: usize) {
    for err in skipped {
        tracing::warn!("Skipped: {err}");
    }
    tracing::info!("Uploaded {} of {total} files", total.saturating_sub(skipped.len()));
}

pub async fn list(ctx: &AppContext) -> Result<(), CliError> {
    let images = ctx.api().list_images().await?;
    print_json(&images)
}
