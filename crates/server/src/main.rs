mod config;
mod events;
mod server;

use anyhow::Result;
use clap::Parser;
use glam::IVec2;

use adrift::{TileKind, WorldMap};
use config::ServerConfig;
use server::GameServer;

#[derive(Parser)]
#[command(name = "adrift-server")]
#[command(about = "Adrift movement server")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = adrift::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value_t = adrift::DEFAULT_TICK_RATE)]
    tick_rate: u32,

    #[arg(short, long, default_value_t = 32)]
    max_clients: usize,
}

/// A small station to move around on: walled floor plate with a door on the
/// east side, a couple of crates, and a lattice walkway out into space.
fn demo_map() -> WorldMap {
    let mut map = WorldMap::new();
    let station = map.add_matrix(100, true);

    for x in 0..16 {
        for y in 0..16 {
            let edge = x == 0 || y == 0 || x == 15 || y == 15;
            let kind = if edge { TileKind::Wall } else { TileKind::Floor };
            map.set_tile(station, IVec2::new(x, y), kind);
        }
    }

    // Airlock out to the walkway.
    map.set_tile(station, IVec2::new(15, 8), TileKind::Floor);
    map.spawn_door(IVec2::new(15, 8));
    for x in 16..24 {
        map.set_tile(station, IVec2::new(x, 8), TileKind::Lattice);
    }

    map.spawn_pushable(IVec2::new(4, 4), true);
    map.spawn_pushable(IVec2::new(10, 11), true);

    map
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let bind_addr = format!("{}:{}", args.bind, args.port);

    let config = ServerConfig {
        tick_rate: args.tick_rate,
        max_clients: args.max_clients,
        spawn_position: IVec2::new(8, 8),
    };

    let mut server = GameServer::new(&bind_addr, demo_map(), config)?;
    log::info!("server listening on {}", server.local_addr());
    server.run();
    log::info!("server shutting down");

    Ok(())
}
