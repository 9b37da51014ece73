use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;

use mcworld_world::{World, WorldConfig};

#[derive(Parser)]
#[command(name = "mcworld", about = "Inspect and edit blocks and players of an Anvil save")]
pub struct Args {
    /// Save folder (the one holding `region/` and `players/`)
    #[arg(env = "MCWORLD_SAVE_DIR")]
    pub save_dir: PathBuf,

    /// Print cache and save statistics before exiting
    #[arg(long)]
    pub report: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the type, data and light of a block
    Block {
        #[arg(allow_hyphen_values = true)]
        x: i32,
        #[arg(allow_hyphen_values = true)]
        y: i32,
        #[arg(allow_hyphen_values = true)]
        z: i32,
    },
    /// Print a player's position and dimension
    Player { name: String },
    /// Change a block and write its chunk back
    SetBlock {
        #[arg(allow_hyphen_values = true)]
        x: i32,
        #[arg(allow_hyphen_values = true)]
        y: i32,
        #[arg(allow_hyphen_values = true)]
        z: i32,
        type_id: u16,
        /// Data nibble, 0-15
        #[arg(value_parser = clap::value_parser!(u8).range(0..16))]
        data: Option<u8>,
    },
}

#[derive(Serialize)]
struct BlockReport {
    position: [i32; 3],
    chunk: [i32; 2],
    type_id: Option<u16>,
    data: Option<u8>,
    sky_light: Option<u8>,
    block_light: Option<u8>,
}

#[derive(Serialize)]
struct PlayerReport<'a> {
    name: &'a str,
    position: Option<[f64; 3]>,
    dimension: Option<i32>,
}

async fn describe_block(world: &World, x: i32, y: i32, z: i32) -> anyhow::Result<BlockReport> {
    let block = world.block(x, y, z).await?;
    let chunk = block.chunk().coord();
    let state = block.state().await;
    Ok(BlockReport {
        position: [x, y, z],
        chunk: [chunk.x, chunk.z],
        type_id: state.type_id,
        data: state.data,
        sky_light: state.sky_light,
        block_light: state.block_light,
    })
}

async fn run(world: &World, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Block { x, y, z } => {
            let report = describe_block(world, x, y, z).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Player { name } => {
            let player = world.player(&name).await?;
            let report = PlayerReport {
                name: player.name(),
                position: player.position(),
                dimension: player.dimension(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::SetBlock { x, y, z, type_id, data } => {
            let block = world.block(x, y, z).await?;
            if !block.set_type(type_id).await {
                bail!("Block ({}, {}, {}) has no section to hold it", x, y, z);
            }
            if let Some(data) = data {
                if !block.set_data(data).await {
                    log::warn!("Chunk {:?} has no data array; data left unchanged", block.chunk().coord());
                }
            }
            let saved = world.save_all().await?;
            log::info!("Wrote {} chunk(s)", saved);

            let report = describe_block(world, x, y, z).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    if !args.save_dir.is_dir() {
        bail!("Save folder {:?} does not exist", args.save_dir);
    }

    let config = WorldConfig::from_env();
    log::info!(
        "Opening {:?} (regions in {:?}, players in {:?}, writing {})",
        args.save_dir,
        config.layout.region_dir,
        config.layout.player_dir,
        config.compression
    );
    let world = World::open(&args.save_dir, config);

    let result = run(&world, args.command)
        .await
        .with_context(|| format!("in save {:?}", args.save_dir));

    if args.report {
        eprintln!("{}", world.metrics().generate_report());
    }
    result
}
