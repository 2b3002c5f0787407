//! Output draining and exit-code polling for attached exec sessions.

use std::time::Duration;

use bollard::container::LogOutput;
use futures_util::StreamExt;
use tokio::time::sleep;

use super::{ContainerExecClient, EXEC_INSPECT_POLL_INTERVAL_MS, ExecOutputStream, exec_failed};
use crate::error::VccpmError;

pub(super) async fn drain_output_async(
    container_id: &str,
    mut output: ExecOutputStream,
) -> Result<Vec<u8>, VccpmError> {
    let mut stdout = Vec::new();

    while let Some(chunk_result) = output.next().await {
        let chunk = chunk_result
            .map_err(|error| exec_failed(container_id, format!("exec stream failed: {error}")))?;

        match chunk {
            LogOutput::StdOut { message } | LogOutput::Console { message } => {
                stdout.extend_from_slice(message.as_ref());
            }
            LogOutput::StdErr { message } => {
                tracing::debug!(
                    container_id,
                    stderr = %String::from_utf8_lossy(message.as_ref()),
                    "script stderr"
                );
            }
            LogOutput::StdIn { .. } => {}
        }
    }

    Ok(stdout)
}

pub(super) async fn wait_for_exit_code_async<C: ContainerExecClient>(
    client: &C,
    container_id: &str,
    exec_id: &str,
) -> Result<i64, VccpmError> {
    loop {
        let inspect = client
            .inspect_exec(exec_id)
            .await
            .map_err(|error| exec_failed(container_id, format!("inspect exec failed: {error}")))?;

        if inspect.running.unwrap_or(false) {
            sleep(Duration::from_millis(EXEC_INSPECT_POLL_INTERVAL_MS)).await;
            continue;
        }

        if let Some(exit_code) = inspect.exit_code {
            return Ok(exit_code);
        }

        return Err(exec_failed(
            container_id,
            format!("exec session '{exec_id}' completed without an exit code"),
        ));
    }
}
