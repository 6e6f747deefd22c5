use std::path::PathBuf;

use structopt::StructOpt;

#[derive(StructOpt, Debug)]
pub enum Command {
    /// Run the post-build packaging step for a firmware build
    Postbuild(PostbuildOpts),
    /// Extract the flashing artifacts from a build directory
    Extract(ExtractOpts),
    /// Merge previously extracted artifacts into a single flash image
    Merge(MergeOpts),
    /// Write a web flasher manifest for previously extracted artifacts
    Manifest(ManifestOpts),
    /// Print the header of an application image
    Info(InfoOpts),
}

#[derive(StructOpt, Debug)]
pub struct PostbuildOpts {
    /// The build directory containing the compiled binaries
    #[structopt(env = "BUILD_DIR", long = "build-dir")]
    pub build_dir: PathBuf,
    /// The project directory to create the firmware directory in
    #[structopt(env = "PROJECT_DIR", long = "project-dir")]
    pub project_dir: PathBuf,
    /// The firmware name stem, defaults to the project directory name
    #[structopt(env = "FIRMWARE_NAME", long = "name")]
    pub name: Option<String>,
    /// Also write a web flasher manifest
    #[structopt(long = "manifest")]
    pub manifest: bool,
}

#[derive(StructOpt, Debug)]
pub struct ExtractOpts {
    /// The build directory containing the compiled binaries
    #[structopt(env = "BUILD_DIR", long = "build-dir")]
    pub build_dir: PathBuf,
    /// The project directory to create the firmware directory in
    #[structopt(env = "PROJECT_DIR", long = "project-dir")]
    pub project_dir: PathBuf,
    /// The firmware name stem, defaults to the project directory name
    #[structopt(env = "FIRMWARE_NAME", long = "name")]
    pub name: Option<String>,
}

#[derive(StructOpt, Debug)]
pub struct MergeOpts {
    /// The project directory containing the firmware directory
    #[structopt(env = "PROJECT_DIR", long = "project-dir")]
    pub project_dir: PathBuf,
    /// The firmware name stem, defaults to the project directory name
    #[structopt(env = "FIRMWARE_NAME", long = "name")]
    pub name: Option<String>,
}

#[derive(StructOpt, Debug)]
pub struct ManifestOpts {
    /// The project directory containing the firmware directory
    #[structopt(env = "PROJECT_DIR", long = "project-dir")]
    pub project_dir: PathBuf,
    /// The firmware name stem, defaults to the project directory name
    #[structopt(env = "FIRMWARE_NAME", long = "name")]
    pub name: Option<String>,
    /// Reference the merged image instead of the individual components
    #[structopt(long = "merged")]
    pub merged: bool,
    /// The firmware version to record in the manifest
    #[structopt(long = "fw-version")]
    pub version: Option<String>,
    /// Ask the flashing tool to erase the flash on a new installation
    #[structopt(long = "prompt-erase")]
    pub prompt_erase: bool,
}

#[derive(StructOpt, Debug)]
pub struct InfoOpts {
    /// The application image filename
    pub filename: PathBuf,
}

#[derive(StructOpt, Debug)]
pub struct Opts {
    #[structopt(subcommand)]
    pub command: Command,
}
