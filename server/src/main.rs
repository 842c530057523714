use clap::Parser;
use std::path::PathBuf;
use studio_model::{
    contact::{SmtpMailer, SmtpOptions},
    init_logging, platform,
};

mod api;
mod app;
mod multipart;
mod pages;
mod session;

#[cfg(test)]
mod test_runner;

/// Start the studio website.
#[derive(Clone, Debug, Parser)]
struct Options {
    /// The port where the app should be served.
    #[clap(short, long, env = "STUDIO_PORT", default_value = "3000")]
    port: u16,

    /// Directory of static assets, served under `/static`.
    #[clap(long, env = "STUDIO_PUBLIC_DIR", default_value = "public")]
    public_dir: PathBuf,

    /// Only send the session cookie over HTTPS.
    #[clap(long, env = "STUDIO_SECURE_COOKIES")]
    secure_cookies: bool,

    #[clap(flatten)]
    platform: platform::Options,

    #[clap(flatten)]
    smtp: SmtpOptions,
}

impl Options {
    async fn serve(self) -> tide::Result<()> {
        let platform = self.platform.connect()?;
        let state = app::State::new(platform, SmtpMailer::new(self.smtp), self.secure_cookies);
        let app = app::app(state, &self.public_dir)?;
        tracing::info!(port = self.port, "serving studio site");
        app.listen(format!("0.0.0.0:{}", self.port)).await?;
        Ok(())
    }
}

#[async_std::main]
async fn main() -> tide::Result<()> {
    init_logging();
    Options::parse().serve().await
}
