//! # Dues Sweep
//!
//! Monthly batch job behind the admin "recalculate billing" button.
//!
//! 1. Triggers the remote billing recalculation from the starting month.
//!
//! 2. Walks every month of the range for every student on the seed roster
//!    and asks the payment provider for the charge status.
//!
//! 3. Prints settled/open totals per month so the office can chase the open
//!    ones.
//!
//! A failed recalculation aborts the run. A failed status check only counts
//! against that student and the sweep keeps going, one flaky provider
//! response should not hide the rest of the month.
use std::env;

use dojo::month::Month;
use dojo::remote::{BillingClient, PaymentsClient};
use dojo::seed::{SEED_PATH, load_seed};
use indicatif::{ProgressBar, ProgressStyle};

/// Start of the sweep range: an explicit month wins, otherwise count back
/// from the current one.
pub fn sweep_start(current: Month, months_back: u32, from: Option<Month>) -> Month {
    from.unwrap_or_else(|| {
        let mut month = current;
        for _ in 0..months_back {
            month = month.pred();
        }
        month
    })
}

pub async fn run_sweep(months_back: u32, from: Option<Month>) {
    let seed = load_seed(SEED_PATH).unwrap();
    println!("Loaded students: {}\n", seed.len());

    let billing = BillingClient::new(env_or("BILLING_URL", "http://127.0.0.1:4100"));
    let payments = PaymentsClient::new(
        env_or("PAYMENTS_URL", "http://127.0.0.1:4000"),
        env::var("PAYMENTS_TOKEN").unwrap_or_default(),
    );

    let current = Month::current();
    let start = sweep_start(current, months_back, from);

    let updated = billing.recalculate_from(start).await.unwrap();
    println!("Recalculated dues for {updated} records\n");

    let months = start.through(current);
    let pb = ProgressBar::new((months.len() * seed.len()) as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )
        .unwrap()
        .progress_chars("=> "),
    );

    let mut failures = 0;
    for month in months {
        pb.set_message(format!("Checking {month}"));

        let mut settled = 0;
        let mut open = 0;
        for student in &seed {
            match payments.status(&student.key, month).await {
                Ok(status) if status.is_settled() => settled += 1,
                Ok(_) => open += 1,
                Err(e) => {
                    failures += 1;
                    pb.println(format!("{}: {e}", student.key));
                }
            }
            pb.inc(1);
        }

        pb.println(format!("{month}: {settled} settled, {open} open"));
    }

    pb.finish_with_message("Done");

    if failures > 0 {
        println!("\n{failures} status checks failed");
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(year: i32, month: u32) -> Month {
        Month::new(year, month).unwrap()
    }

    #[test]
    fn test_explicit_start_wins() {
        let start = sweep_start(month(2026, 8), 3, Some(month(2026, 1)));
        assert_eq!(start, month(2026, 1));
    }

    #[test]
    fn test_counting_back_crosses_the_year() {
        assert_eq!(sweep_start(month(2026, 2), 3, None), month(2025, 11));
        assert_eq!(sweep_start(month(2026, 8), 0, None), month(2026, 8));
    }
}
