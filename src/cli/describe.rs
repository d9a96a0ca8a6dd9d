use crate::error::Result;
use crate::pipeline::schedule;

pub fn run() -> Result<()> {
    let json = serde_json::to_string_pretty(&schedule())?;
    println!("{json}");
    Ok(())
}
