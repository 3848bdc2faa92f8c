pub mod member;
pub mod proposal;
pub mod wallet;

use reputation_dao_sdk::ActionReport;

pub fn print_report<T>(action: &str, report: &ActionReport<T>) {
    match &report.outcome {
        Ok(_) => println!("{} succeeded", action),
        Err(failure) if failure.kind.is_informational() => println!("Note: {}", failure.message),
        Err(failure) => eprintln!("{} failed: {}", action, failure),
    }
    if let Some(Err(e)) = &report.reconciled {
        eprintln!("Could not reload after {}: {}", action, e);
    }
}
