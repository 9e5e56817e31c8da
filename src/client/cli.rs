use anyhow::{Context, bail};
use base64::{Engine as _, engine::general_purpose};
use clap::Parser;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
pub struct ClientArgs {
    /// Gateway base URL
    #[arg(short, long, default_value = "http://127.0.0.1:3000")]
    pub gateway: String,

    /// Image to upload (PNG or JPEG)
    #[arg(short, long)]
    pub file: PathBuf,

    /// Apply this filter instead of analyzing colors
    #[arg(long)]
    pub filter_type: Option<i32>,

    /// Where to write the filtered image
    #[arg(short, long, default_value = "filtered.jpg")]
    pub output: PathBuf,
}

#[derive(Debug, Deserialize)]
struct PaletteReply {
    colors: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilterReply {
    image_id: String,
    filtered: String,
}

async fn ensure_success(resp: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    let status = resp.status();
    if !status.is_success() {
        bail!("gateway returned {}: {}", status, resp.text().await?);
    }
    Ok(resp)
}

/// Upload an image to the gateway once and print (or save) the result.
pub async fn run_client(args: ClientArgs) -> anyhow::Result<()> {
    let image = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("reading {}", args.file.display()))?;
    let file_name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    let mut form = Form::new().part("file", Part::bytes(image).file_name(file_name));
    let base = args.gateway.trim_end_matches('/');
    let http = reqwest::Client::new();

    match args.filter_type {
        Some(filter_type) => {
            form = form.text("filterType", filter_type.to_string());
            let resp = http
                .post(format!("{}/apply-filter", base))
                .multipart(form)
                .send()
                .await?;
            let resp = ensure_success(resp).await?;

            let reply: FilterReply = resp.json().await?;
            let filtered = general_purpose::STANDARD
                .decode(reply.filtered.as_bytes())
                .context("gateway returned invalid base64")?;
            tokio::fs::write(&args.output, &filtered).await?;
            println!(
                "Image {} filtered ({} bytes) -> {}",
                reply.image_id,
                filtered.len(),
                args.output.display()
            );
        }
        None => {
            let resp = http
                .post(format!("{}/analyze-colors", base))
                .multipart(form)
                .send()
                .await?;
            let resp = ensure_success(resp).await?;

            let reply: PaletteReply = resp.json().await?;
            println!("Dominant colors: {}", reply.colors.join(", "));
        }
    }

    Ok(())
}
