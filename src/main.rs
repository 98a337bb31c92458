use std::path::PathBuf;

use clap::Parser;
use cubicle_view::{config::ViewerConfig, story::StoryRecord};

#[derive(Parser, Debug, Clone)]
#[command(name = "cubicle-view")]
#[command(about = "First-person walkthrough of a cubicle office", long_about = None)]
struct Args {
    /// Directory holding desk.glb, monitor.glb and chair.glb
    #[arg(long, default_value = env!("CUBICLE_VIEW_ASSETS"))]
    assets: PathBuf,

    /// Number of generic cubicles next to the protagonist's one
    #[arg(long, default_value_t = 5)]
    cubicles: usize,

    /// Hide the environment tuning panel
    #[arg(long = "no-debug-panel", default_value = "false")]
    no_debug_panel: bool,

    /// Story record (JSON) shown beside the view
    #[arg(long)]
    story: Option<PathBuf>,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ViewerConfig::default();
    config.assets.root = args.assets;
    config.cubicles.count = args.cubicles;
    config.debug_panel = !args.no_debug_panel;
    config.window_size = (args.width.max(1), args.height.max(1));

    let story = args.story.as_deref().map(StoryRecord::load).transpose()?;

    cubicle_view::flow::run(config, story)
}
