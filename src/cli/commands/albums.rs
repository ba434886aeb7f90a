use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::api::format::{AlbumSummary, MemberView};
use crate::cli::utils::{output_data, output_empty_collection, output_success};
use crate::cli::CliContext;
use crate::database::models::AlbumRole;

#[derive(Subcommand)]
pub enum AlbumCommands {
    #[command(about = "List albums you are a member of")]
    List {
        #[arg(long, help = "Follow cursors until every album is listed")]
        all: bool,
        #[arg(long, help = "Page size")]
        limit: Option<u32>,
        #[arg(long, help = "Cursor returned by a previous page")]
        cursor: Option<String>,
    },

    #[command(about = "Create an album")]
    Create {
        #[arg(help = "Album name")]
        name: String,
        #[arg(long = "member", help = "User id to add as a viewer (repeatable)")]
        members: Vec<Uuid>,
    },

    #[command(about = "Show an album and its members")]
    Show {
        album: Uuid,
    },

    #[command(about = "Rename an album (owners only)")]
    Rename {
        album: Uuid,
        name: String,
    },

    #[command(about = "Delete an album (owners only)")]
    Delete {
        album: Uuid,
    },

    #[command(about = "Invite users by username as viewers")]
    Invite {
        album: Uuid,
        #[arg(required = true)]
        names: Vec<String>,
    },

    #[command(about = "Change a member's role: OWNER, MEMBER or VIEWER")]
    Role {
        album: Uuid,
        user: Uuid,
        role: AlbumRole,
    },

    #[command(about = "Remove a member, or leave the album when given your own id")]
    Remove {
        album: Uuid,
        user: Uuid,
    },
}

pub async fn handle(cmd: AlbumCommands, ctx: &CliContext) -> anyhow::Result<()> {
    let client = ctx.client();

    match cmd {
        AlbumCommands::List { all, limit, cursor } => {
            let (albums, next_cursor) = if all {
                let albums = client.albums_paginator(limit.unwrap_or(50)).collect_all().await?;
                (albums, None)
            } else {
                let page = client.list_albums(cursor.as_deref(), limit).await?;
                (page.items, page.next_cursor)
            };

            if albums.is_empty() {
                return output_empty_collection(&ctx.output, "albums", "No albums");
            }

            let data = json!({ "albums": albums, "next_cursor": next_cursor });
            output_data(&ctx.output, &data, |_| {
                for album in &albums {
                    print_summary(album);
                }
                if let Some(next) = &next_cursor {
                    println!();
                    println!("More albums: --cursor {}", next);
                }
            })
        }
        AlbumCommands::Create { name, members } => {
            let album_id = client.create_album(&name, &members).await?;
            output_success(
                &ctx.output,
                &format!("Created album {} ({})", name, album_id),
                Some(json!({ "album_id": album_id })),
            )
        }
        AlbumCommands::Show { album } => {
            let detail = client.get_album(album).await?;
            output_data(&ctx.output, &detail, |detail| {
                println!("{} ({})", detail.name, detail.id);
                println!("Created:   {}", detail.created_at.format("%Y-%m-%d %H:%M"));
                println!("Your role: {}", detail.your_role);
                println!("Members:");
                print_members(&detail.members);
            })
        }
        AlbumCommands::Rename { album, name } => {
            let renamed = client.rename_album(album, &name).await?;
            output_success(
                &ctx.output,
                &format!("Renamed album to {}", renamed.name),
                Some(serde_json::to_value(&renamed)?),
            )
        }
        AlbumCommands::Delete { album } => {
            client.delete_album(album).await?;
            output_success(&ctx.output, &format!("Deleted album {}", album), None)
        }
        AlbumCommands::Invite { album, names } => {
            let members = client.invite_members(album, &names).await?;
            output_data(&ctx.output, &members, |members| {
                println!("Album now has {} member(s):", members.len());
                print_members(members);
            })
        }
        AlbumCommands::Role { album, user, role } => {
            let member = client.set_member_role(album, user, role).await?;
            output_success(
                &ctx.output,
                &format!("{} is now {}", member.name, member.role),
                Some(serde_json::to_value(&member)?),
            )
        }
        AlbumCommands::Remove { album, user } => {
            client.remove_member(album, user).await?;
            output_success(&ctx.output, &format!("Removed {} from album {}", user, album), None)
        }
    }
}

fn print_summary(album: &AlbumSummary) {
    let latest = album
        .latest_image_timestamp
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{}  {:<30} {:>4} image(s)  latest {}  {}",
        album.id, album.name, album.image_count, latest, album.your_role
    );
}

fn print_members(members: &[MemberView]) {
    for member in members {
        println!("  {}  {:<20} {}", member.id, member.name, member.role);
    }
}
