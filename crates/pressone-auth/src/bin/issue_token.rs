//! Bearer token issuer
//!
//! Usage: issue_token <subject> [account_id]
//!
//! Without an account id an admin token is issued. The signing secret is
//! read from `PRESSONE__AUTH__JWT_SECRET`.

use pressone_auth::{Claims, JwtService};

const DEFAULT_LIFETIME_SECS: i64 = 30 * 24 * 3600;

fn main() {
    dotenvy::dotenv().ok();

    let mut args = std::env::args().skip(1);
    let subject = args.next().unwrap_or_else(|| "admin".to_string());
    let claims = match args.next().map(|s| s.parse::<i64>()) {
        Some(Ok(account_id)) => Claims::operator(&subject, account_id),
        Some(Err(_)) => {
            eprintln!("account_id must be an integer");
            std::process::exit(2);
        }
        None => Claims::admin(&subject),
    };

    let Ok(secret) = std::env::var("PRESSONE__AUTH__JWT_SECRET") else {
        eprintln!("PRESSONE__AUTH__JWT_SECRET is not set");
        std::process::exit(2);
    };

    let service = JwtService::new(&secret, DEFAULT_LIFETIME_SECS);
    match service.create_token(&claims) {
        Ok(token) => {
            println!("Subject: {}", claims.sub);
            println!("Role: {}", claims.role);
            if let Some(account_id) = claims.account_id {
                println!("Account: {}", account_id);
            }
            println!("Token: {}", token);
        }
        Err(e) => {
            eprintln!("Failed to issue token: {}", e);
            std::process::exit(1);
        }
    }
}
