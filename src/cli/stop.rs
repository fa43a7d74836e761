use crate::cli::client::DaemonClient;
use crate::core::models::JobType;
use anyhow::Result;

pub async fn run(target: Option<JobType>) -> Result<()> {
    let client = DaemonClient::connect().await?;

    match target {
        Some(job_type) => {
            let stopped = client.call_bool("StopPolling", job_type.name()).await?;
            if stopped {
                println!("Stopped {} polling", job_type);
            } else {
                println!("No active {} polling", job_type);
            }
        }
        None => {
            client.call_unit("StopAllPolling").await?;
            println!("Stopped all polling");
        }
    }

    Ok(())
}
