use chrono::{Duration, Utc};
use clap::Subcommand;
use serde_json::json;

use crate::cli::config::save_session;
use crate::cli::utils::{output_data, output_success, read_password};
use crate::cli::CliContext;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Create an account")]
    Register {
        #[arg(help = "Email")]
        email: String,
        #[arg(long, help = "Password (read from PIXXOR_PASSWORD or stdin if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Login and remember the token")]
    Login {
        #[arg(help = "Email")]
        email: String,
        #[arg(long, help = "Password (read from PIXXOR_PASSWORD or stdin if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Forget the saved token")]
    Logout,

    #[command(about = "Show current user information")]
    Whoami,

    #[command(about = "Choose a username (required before using albums)")]
    Onboard {
        #[arg(help = "Username: 3-32 letters, digits, '.', '_' or '-'")]
        name: String,
        #[arg(long, help = "Avatar image URL")]
        avatar_url: Option<String>,
    },
}

pub async fn handle(cmd: AuthCommands, ctx: &mut CliContext) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Register { email, password } => {
            let password = read_password(password)?;
            let user = ctx.client().register(&email, &password).await?;
            output_success(
                &ctx.output,
                &format!("Registered {}. Run `pixxor auth login {}` next", user.email, user.email),
                Some(serde_json::to_value(&user)?),
            )
        }
        AuthCommands::Login { email, password } => {
            let password = read_password(password)?;
            let login = ctx.client().login(&email, &password).await?;

            ctx.session.server = Some(ctx.server.clone());
            ctx.session.token = Some(login.token.clone());
            ctx.session.email = Some(login.user.email.clone());
            ctx.session.expires_at = Some(Utc::now() + Duration::seconds(login.expires_in));
            save_session(&ctx.session)?;

            let hint = if login.user.onboarded {
                String::new()
            } else {
                " (run `pixxor auth onboard <username>` before using albums)".to_string()
            };
            output_success(
                &ctx.output,
                &format!("Logged in as {}{}", login.user.email, hint),
                Some(json!({ "user": login.user, "expires_in": login.expires_in })),
            )
        }
        AuthCommands::Logout => {
            ctx.session.clear_login();
            save_session(&ctx.session)?;
            output_success(&ctx.output, "Logged out", None)
        }
        AuthCommands::Whoami => {
            let user = ctx.client().whoami().await?;
            output_data(&ctx.output, &user, |user| {
                println!("{}", user.email);
                println!("Username:  {}", user.name.as_deref().unwrap_or("(not onboarded)"));
                if let Some(avatar) = &user.avatar_url {
                    println!("Avatar:    {}", avatar);
                }
                println!("Id:        {}", user.id);
                println!("Joined:    {}", user.created_at.format("%Y-%m-%d"));
            })
        }
        AuthCommands::Onboard { name, avatar_url } => {
            let user = ctx.client().onboard(&name, avatar_url.as_deref()).await?;
            output_success(
                &ctx.output,
                &format!("Username set to {}", user.name.as_deref().unwrap_or(&name)),
                Some(serde_json::to_value(&user)?),
            )
        }
    }
}
