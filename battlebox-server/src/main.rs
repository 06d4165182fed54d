//! BattleBox Server
//!
//! Runs the orchestrator against the in-memory sandbox world and plays one
//! scripted match. Arenas come from `BATTLEBOX_CONFIG` when set, otherwise a
//! built-in demo arena is used.

use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use battlebox::{
    VERSION,
    arena::ArenaDefinition,
    arena::TeamLocations,
    core::{CellPos, Location, StructureRef, Volume, WorldPoint},
    game::PhaseDurations,
    server::{ArenaSetup, ArenaServer, Orchestrator, OrchestratorConfig},
    world::{neutral_footprint, RecordingMessenger, SandboxWorld},
    ArenaId, MarkerColor, ParticipantId, Phase, KitKind,
};

const DEMO_ARENA: &str = "castle";
const DEMO_PLAYERS: u8 = 4;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("BattleBox Server v{}", VERSION);

    let mut config = OrchestratorConfig::from_env()?;
    if config.arenas.is_empty() {
        info!("No arenas configured, using the demo arena");
        config.arenas.push(demo_arena());
        config.durations = PhaseDurations { waiting: 2, team_select: 2, starting: 1, match_length: 10, ending: 2 };
        config.tick_interval_ms = 100;
    }
    if config.lobby.is_none() {
        config.lobby = Some(WorldPoint { world: "lobby".to_string(), location: Location::new(0.5, 64.0, 0.5) });
    }

    let world = demo_world(&config);
    let arena = config.arenas[0].definition.id.clone();
    let orchestrator = Orchestrator::new(config, world, RecordingMessenger::new())?;
    let server = ArenaServer::new(orchestrator);

    let runner = {
        let server = server.clone();
        tokio::spawn(async move { server.run().await })
    };

    demo_match(&server, &arena).await?;

    server.shutdown();
    runner.await?;
    info!("Final stats: {:?}", server.stats().await);
    Ok(())
}

fn demo_arena() -> ArenaSetup {
    let definition = ArenaDefinition {
        id: ArenaId::new(DEMO_ARENA),
        world: "arena".to_string(),
        scoring_volume: Some(Volume::new(CellPos::new(0, 64, 0), CellPos::new(2, 64, 2))),
        team_spawns: TeamLocations::new(Location::new(-10.5, 65.0, 1.5), Location::new(12.5, 65.0, 1.5)),
        team_starts: TeamLocations::new(Location::new(-4.5, 65.0, 1.5), Location::new(6.5, 65.0, 1.5)),
        durations: None,
    };
    ArenaSetup {
        definition,
        structure: StructureRef::new("castle.schem"),
        anchor: CellPos::new(0, 60, 0),
        max_instances: 2,
    }
}

/// Sandbox with every configured world and structure loaded.
fn demo_world(config: &OrchestratorConfig) -> SandboxWorld {
    let mut world = SandboxWorld::new();
    if let Some(lobby) = &config.lobby {
        world.add_world(lobby.world.clone());
    }
    for setup in &config.arenas {
        world.add_world(setup.definition.world.clone());
        match &setup.definition.scoring_volume {
            Some(volume) => world.add_structure(setup.structure.clone(), neutral_footprint(volume, setup.anchor)),
            None => warn!("Arena {} has no scoring volume", setup.definition.id),
        }
    }
    world
}

async fn demo_match(
    server: &ArenaServer<SandboxWorld, RecordingMessenger>,
    arena: &ArenaId,
) -> anyhow::Result<()> {
    info!("=== Starting Demo Match ===");

    let players: Vec<ParticipantId> = (1..=DEMO_PLAYERS).map(|i| ParticipantId::new([i; 16])).collect();
    let mut session = None;
    for player in &players {
        let (id, team) = server.join_or_create(*player, arena).await?;
        info!("Player {} joined session {} on team {}", player, id, team);
        session = Some(id);
    }
    let session = session.ok_or_else(|| anyhow::anyhow!("no players joined"))?;

    wait_for(server, session, Phase::TeamSelect).await?;
    let kits = [KitKind::Fighter, KitKind::Sniper, KitKind::Healer, KitKind::Speedster];
    for (player, kit) in players.iter().zip(kits) {
        let loadout = server.select_kit(*player, kit).await?;
        info!("Player {} picked {} ({})", player, kit.name(), loadout.team);
    }

    wait_for(server, session, Phase::Active).await?;
    let volume = server
        .with(|o| o.scoring_volume(&session))
        .await
        .ok_or_else(|| anyhow::anyhow!("session {} has no scoring area", session))?;

    for cell in volume.cells() {
        let outcome = server.place_marker(players[0], cell, MarkerColor::Red).await?;
        if outcome.is_decided() {
            info!("Outcome: {:?}", outcome);
            break;
        }
    }

    if let Some(status) = server.status(session).await {
        info!("Session {} is {}: {}", session, status.phase, status.reason.unwrap_or_default());
    }
    info!("Pool: {:?}", server.with(|o| o.pool_stats()).await);

    wait_for_teardown(server, session).await;
    info!("=== Demo Match Complete ===");
    Ok(())
}

async fn wait_for(
    server: &ArenaServer<SandboxWorld, RecordingMessenger>,
    session: battlebox::SessionId,
    phase: Phase,
) -> anyhow::Result<()> {
    loop {
        match server.status(session).await {
            Some(status) if status.phase == phase => return Ok(()),
            Some(_) => tokio::time::sleep(Duration::from_millis(50)).await,
            None => anyhow::bail!("session {} ended before {}", session, phase),
        }
    }
}

async fn wait_for_teardown(server: &ArenaServer<SandboxWorld, RecordingMessenger>, session: battlebox::SessionId) {
    while server.status(session).await.is_some() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    info!("Session {} torn down", session);
}
