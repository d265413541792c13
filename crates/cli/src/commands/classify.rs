//! Classification command.

use skin_one_client::AppContext;
use skin_one_client::models::ClassifyRequest;
use skin_one_core::{ImageId, Stage};

use super::{CliError, print_json};

pub async fn classify(
    ctx: &AppContext,
    image: String,
    stage: Stage,
    observations: Option<String>,
) -> Result<(), CliError> {
    let request = ClassifyRequest {
        image_id: ImageId::new(image),
        stage,
        observations: observations
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty()),
    };
    let response = ctx.api().classify(&request).await?;
    tracing::info!("Image {} classified as {}", response.image_id, response.stage);
    print_json(&response)
}
