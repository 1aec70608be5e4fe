use crate::build::{ProjectConfig, TargetPlatform};
use crate::build::platform::host_arch;
use crate::compiler::python::{discover_python, version_string};
use crate::result::Result;
use crate::utils::SystemRunner;

pub async fn execute() -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config = ProjectConfig::discover(&[cwd.as_path()]).await?;

    println!("deskpack");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("Platform: {} ({})", TargetPlatform::current(), host_arch());
    println!("Framework package: {}", config.runtime.package);

    let python = config.runtime.python.as_deref();
    match discover_python(python, &cwd) {
        Ok(python) => {
            let runner = SystemRunner::new(false);
            match version_string(&runner, &python).await {
                Ok(version) => println!("Python: {} ({})", version, python.display()),
                Err(e) => {
                    log::warn!("info: interpreter query failed: {}", e);
                    println!("Python: unavailable ({})", e);
                }
            }
        }
        Err(e) => println!("Python: {}", e),
    }
    Ok(())
}
