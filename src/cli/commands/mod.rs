//! Command execution.

mod build;

use crate::cli::{Args, OutputManager};
use crate::error::Result;

use build::execute_build;

/// Execute the build described by the parsed arguments
pub async fn execute_command(args: Args) -> Result<i32> {
    if let Err(validation_error) = args.validate() {
        let output = OutputManager::new(false, false);
        output.error(&validation_error.to_string());
        return Ok(1);
    }

    let output = OutputManager::new(args.verbose, false);

    match execute_build(&args, &output).await {
        Ok(exit_code) => Ok(exit_code),
        Err(e) => {
            output.error(&format!("Build failed: {}", e));

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                let _ = output.info("Recovery suggestions:");
                for suggestion in suggestions {
                    let _ = output.indent(&format!("• {}", suggestion));
                }
            }

            Ok(1)
        }
    }
}
