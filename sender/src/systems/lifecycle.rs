use std::io;
use std::path::PathBuf;

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use log::info;
use protocol::Receiver;
use tokio::process::Command;

use crate::Error;

/// Discovers and starts the receiver application on the remote device.
pub trait Launcher: Send + Sync {
    fn installed_apps(&self) -> BoxFuture<'static, io::Result<Vec<String>>>;

    fn launch(&self, package: &str) -> BoxFuture<'static, io::Result<()>>;
}

/// Starts the receiver by running `program <package>`.
///
/// Without a program the receiver is expected to be running already and is
/// reported as the only installed app.
pub struct CommandLauncher {
    program: Option<PathBuf>,
    package: String,
}

impl CommandLauncher {
    pub fn new(program: Option<PathBuf>, package: impl Into<String>) -> Self {
        Self {
            program,
            package: package.into(),
        }
    }
}

impl Launcher for CommandLauncher {
    fn installed_apps(&self) -> BoxFuture<'static, io::Result<Vec<String>>> {
        let package = self.package.clone();

        match self.program.clone() {
            Some(program) => async move {
                match tokio::fs::metadata(&program).await {
                    Ok(_) => Ok(vec![package]),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
                    Err(e) => Err(e),
                }
            }
            .boxed(),
            None => future::ready(Ok(vec![package])).boxed(),
        }
    }

    fn launch(&self, package: &str) -> BoxFuture<'static, io::Result<()>> {
        let Some(program) = self.program.clone() else {
            return future::ready(Ok(())).boxed();
        };
        let package = package.to_owned();

        async move {
            Command::new(&program).arg(&package).spawn()?;
            Ok(())
        }
        .boxed()
    }
}

pub struct LifecycleSystem;

impl LifecycleSystem {
    /// Makes sure the receiver app is installed, launches it and waits for it
    /// to settle before a transfer starts.
    pub async fn prepare_receiver<L>(launcher: &L, receiver: &Receiver) -> Result<(), Error>
    where
        L: Launcher + ?Sized,
    {
        let apps = launcher.installed_apps().await.map_err(Error::Launch)?;
        if !apps.iter().any(|app| *app == *receiver.package) {
            return Err(Error::ReceiverMissing(receiver.package.to_string()));
        }

        info!("Launching receiver {}", receiver.package);
        launcher.launch(&receiver.package).await.map_err(Error::Launch)?;
        tokio::time::sleep(receiver.launch_delay).await;

        Ok(())
    }
}
