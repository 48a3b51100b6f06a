//! Fills a running API with generated contacts.
//!
//! ```text
//! SEED_ACCESS_TOKEN=<jwt> cargo run --bin seed -- --count 50
//! ```

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::Serialize;
use time::{Date, Month};
use tracing::{info, warn};

const FIRST_NAMES: &[&str] = &[
    "Olena", "Taras", "Iryna", "Bohdan", "Oksana", "Andrii", "Sofiia", "Dmytro", "Kateryna",
    "Mykola", "Yulia", "Serhii", "Nataliia", "Petro", "Halyna", "Ivan",
];
const LAST_NAMES: &[&str] = &[
    "Shevchenko", "Kovalenko", "Bondarenko", "Tkachenko", "Kravchenko", "Oliinyk", "Melnyk",
    "Boiko", "Moroz", "Lysenko", "Savchenko", "Rudenko",
];
const STREETS: &[&str] = &[
    "Khreshchatyk", "Sahaidachnoho", "Franka", "Lesi Ukrainky", "Shevchenka", "Soborna",
];
const CITIES: &[&str] = &["Kyiv", "Lviv", "Odesa", "Kharkiv", "Dnipro", "Poltava"];

#[derive(Parser, Debug)]
#[command(name = "seed", about = "Post generated contacts to the contacts API")]
struct Args {
    /// Contacts endpoint
    #[arg(long, default_value = "http://127.0.0.1:8000/api/contacts")]
    api_url: String,

    /// Access token of the user that will own the contacts
    #[arg(long, env = "SEED_ACCESS_TOKEN")]
    token: String,

    #[arg(long, default_value_t = 1000)]
    count: usize,

    /// Pause between requests; create is limited to 2 requests per 5 seconds
    #[arg(long, default_value_t = 2500)]
    delay_ms: u64,
}

#[derive(Debug, Serialize)]
struct NewContact {
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    birthday: String,
    address: String,
}

fn fake_contact(rng: &mut StdRng, n: usize) -> anyhow::Result<NewContact> {
    let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Olena");
    let last = LAST_NAMES.choose(rng).copied().unwrap_or("Melnyk");

    let year = rng.gen_range(1950..=2010);
    let month = Month::try_from(rng.gen_range(1u8..=12))?;
    let day = rng.gen_range(1..=time::util::days_in_year_month(year, month));
    let birthday = Date::from_calendar_date(year, month, day)?;

    Ok(NewContact {
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: format!("{}.{}{}@example.com", first, last, n).to_lowercase(),
        phone: format!("+380{:09}", rng.gen_range(0..1_000_000_000u64)),
        birthday: format!(
            "{:04}-{:02}-{:02}",
            birthday.year(),
            u8::from(birthday.month()),
            birthday.day()
        ),
        address: format!(
            "{} St, {}, {}",
            STREETS.choose(rng).copied().unwrap_or("Soborna"),
            rng.gen_range(1..200),
            CITIES.choose(rng).copied().unwrap_or("Kyiv"),
        ),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "seed=info".into()))
        .init();

    let args = Args::parse();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("build http client")?;
    let mut rng = StdRng::from_entropy();

    let mut created = 0usize;
    for n in 0..args.count {
        let contact = fake_contact(&mut rng, n)?;
        match client
            .post(&args.api_url)
            .bearer_auth(&args.token)
            .json(&contact)
            .send()
            .await
        {
            Ok(res) if res.status().is_success() => created += 1,
            Ok(res) => warn!(status = %res.status(), n, "contact rejected"),
            Err(e) => warn!(error = %e, n, "connection error"),
        }
        if args.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(args.delay_ms)).await;
        }
    }

    info!(created, requested = args.count, "done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_contacts_fit_validation_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in 0..200 {
            let c = fake_contact(&mut rng, n).unwrap();
            assert!(c.first_name.chars().count() >= 2);
            assert!(c.last_name.chars().count() >= 2);
            assert!(c.phone.len() <= 30);
            assert!(c.address.chars().count() <= 150);
            assert!(c.email.contains('@'));
            assert_eq!(c.birthday.len(), 10);
        }
    }

    #[test]
    fn args_read_defaults() {
        let args = Args::parse_from(["seed", "--token", "abc"]);
        assert_eq!(args.count, 1000);
        assert_eq!(args.api_url, "http://127.0.0.1:8000/api/contacts");
    }
}
