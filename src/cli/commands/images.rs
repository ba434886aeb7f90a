use clap::{Args, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use uuid::Uuid;

use crate::api::format::UploadResult;
use crate::cli::utils::{output_data, output_empty_collection, output_success};
use crate::cli::CliContext;
use crate::effects::Effects;

#[derive(Subcommand)]
pub enum ImageCommands {
    #[command(about = "List the images of an album, newest first")]
    List {
        album: Uuid,
        #[arg(long, help = "Follow cursors until every image is listed")]
        all: bool,
        #[arg(long, help = "Page size")]
        limit: Option<u32>,
        #[arg(long, help = "Cursor returned by a previous page")]
        cursor: Option<String>,
    },

    #[command(about = "Upload an image file")]
    Upload {
        path: PathBuf,
        #[arg(long, help = "Target album (defaults to your Unsorted album)")]
        album: Option<Uuid>,
    },

    #[command(about = "Show image metadata")]
    Show {
        image: Uuid,
    },

    #[command(about = "Delete an image (uploader or album owner)")]
    Delete {
        image: Uuid,
    },

    #[command(about = "Create a new image with effects applied")]
    Effects {
        image: Uuid,
        #[command(flatten)]
        effects: EffectFlags,
        #[arg(long, help = "Album for the result (defaults to the first album you can upload to)")]
        album: Option<Uuid>,
    },
}

#[derive(Args)]
pub struct EffectFlags {
    #[arg(long)]
    grayscale: bool,
    #[arg(long)]
    invert: bool,
    #[arg(long)]
    flip_horizontal: bool,
    #[arg(long)]
    flip_vertical: bool,
}

impl From<EffectFlags> for Effects {
    fn from(flags: EffectFlags) -> Self {
        Effects {
            grayscale: flags.grayscale,
            invert: flags.invert,
            flip_horizontal: flags.flip_horizontal,
            flip_vertical: flags.flip_vertical,
        }
    }
}

pub async fn handle(cmd: ImageCommands, ctx: &CliContext) -> anyhow::Result<()> {
    let client = ctx.client();

    match cmd {
        ImageCommands::List { album, all, limit, cursor } => {
            let (images, next_cursor) = if all {
                let images = client.images_paginator(album, limit.unwrap_or(50)).collect_all().await?;
                (images, None)
            } else {
                let page = client.list_album_images(album, cursor.as_deref(), limit).await?;
                (page.items, page.next_cursor)
            };

            if images.is_empty() {
                return output_empty_collection(&ctx.output, "images", "No images");
            }

            let data = json!({ "images": images, "next_cursor": next_cursor });
            output_data(&ctx.output, &data, |_| {
                for image in &images {
                    println!(
                        "{}  {:<32} {}x{}  {}",
                        image.id,
                        image.filename,
                        image.width,
                        image.height,
                        image.created_at.format("%Y-%m-%d %H:%M")
                    );
                }
                if let Some(next) = &next_cursor {
                    println!();
                    println!("More images: --cursor {}", next);
                }
            })
        }
        ImageCommands::Upload { path, album } => {
            if !path.is_file() {
                anyhow::bail!("File not found: {}", path.display());
            }
            let result = client.upload(album, &path).await?;
            report_new_image(ctx, "Uploaded", &result)
        }
        ImageCommands::Show { image } => {
            let detail = client.get_image(image).await?;
            output_data(&ctx.output, &detail, |detail| {
                let image = &detail.image;
                println!("{} ({})", image.filename, image.id);
                println!("Type:     {}", image.content_type);
                println!("Size:     {}x{}, {} bytes", image.width, image.height, image.size_bytes);
                println!("URL:      {}", image.url);
                if let Some(source) = image.derived_from {
                    println!("Source:   {}", source);
                }
                if !image.effects.is_empty() {
                    println!("Effects:  {}", image.effects.join(", "));
                }
                println!("Uploaded: {}", image.created_at.format("%Y-%m-%d %H:%M"));
                for album_id in &detail.album_ids {
                    println!("Album:    {}", album_id);
                }
            })
        }
        ImageCommands::Delete { image } => {
            client.delete_image(image).await?;
            output_success(&ctx.output, &format!("Deleted image {}", image), None)
        }
        ImageCommands::Effects { image, effects, album } => {
            let effects = Effects::from(effects);
            if effects.is_empty() {
                anyhow::bail!("Select at least one effect: --grayscale, --invert, --flip-horizontal, --flip-vertical");
            }
            let result = client.apply_effects(image, effects, album).await?;
            report_new_image(ctx, "Created", &result)
        }
    }
}

fn report_new_image(ctx: &CliContext, verb: &str, result: &UploadResult) -> anyhow::Result<()> {
    output_success(
        &ctx.output,
        &format!(
            "{} {} ({}) in album {}",
            verb, result.image.filename, result.image.id, result.album_id
        ),
        Some(serde_json::to_value(result)?),
    )
}
