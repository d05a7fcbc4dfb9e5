//! Prints a bearer token for local testing of per-user limits.
//!
//! Signs with the same `JWT_*` environment variables as the server.

use anyhow::Context;
use clap::Parser;
use uuid::Uuid;

use tradelog_core::ports::TokenService;
use tradelog_infra::JwtTokenService;

/// Issue a development bearer token.
#[derive(Debug, Parser)]
#[command(name = "issue-token", version, about)]
struct Args {
    /// Email recorded in the token.
    email: String,

    /// User id to embed; a random one is generated when omitted.
    #[arg(long)]
    user_id: Option<Uuid>,

    /// Comma-separated roles.
    #[arg(long, value_delimiter = ',', default_value = "user")]
    roles: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let user_id = args.user_id.unwrap_or_else(Uuid::new_v4);
    let tokens = JwtTokenService::from_env();
    let token = tokens
        .generate_token(user_id, &args.email, args.roles)
        .context("failed to sign token")?;

    eprintln!(
        "user {user_id}, expires in {}s",
        tokens.expiration_seconds()
    );
    println!("{token}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parses_email_and_user_id() {
        let id = Uuid::new_v4();
        let args = Args::try_parse_from([
            "issue-token",
            "trader@example.com",
            "--user-id",
            &id.to_string(),
            "--roles",
            "user,admin",
        ])
        .unwrap();

        assert_eq!(args.email, "trader@example.com");
        assert_eq!(args.user_id, Some(id));
        assert_eq!(args.roles, ["user", "admin"]);
    }

    #[test]
    fn test_help_is_not_taken_as_email() {
        let err = Args::try_parse_from(["issue-token", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_rejects_malformed_user_id() {
        assert!(Args::try_parse_from(["issue-token", "a@b.c", "--user-id", "42"]).is_err());
    }
}
