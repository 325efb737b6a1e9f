use std::path::PathBuf;

use crate::prelude::*;
use clap::Parser;

mod convert;
mod error;
mod output;
mod prelude;
mod progress;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Convert PDF documents to Markdown, reconstructing headings, tables and images"
)]
pub struct App {
    /// PDF files to convert
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    #[clap(flatten)]
    options: convert::ConvertArgs,

    /// Do not display a progress bar
    #[clap(long, env = "PDF2MD_NO_PROGRESS", default_value = "false")]
    no_progress: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let app = App::parse();

    convert::run(&app.inputs, &app.options, !app.no_progress)
}
