//! End-to-end combat scenarios driven through the public simulation API.

use skirmish_core::prelude::*;
use skirmish_test_utils::fixtures::{arena_with_config, arena_with_player, run_ticks, ARENA_CENTER};

const DT: f32 = 1.0 / 60.0;

fn player_health(sim: &Simulation) -> f32 {
    sim.entity(sim.player_id().unwrap()).unwrap().health.current()
}

#[test]
fn test_enemy_beyond_max_distance_is_not_targeted() {
    let mut sim = arena_with_player();
    sim.spawn_enemy(ARENA_CENTER + Vec2::new(500.0, 0.0)).unwrap();
    sim.tick(DT);

    assert_eq!(sim.current_target(), None);
    assert_eq!(sim.target_next(), None);
    assert!(sim.snapshot().target.is_none());
}

#[test]
fn test_perfect_parry_blocks_all_damage_and_stuns() {
    let mut sim = arena_with_player();
    assert!(sim.start_shield());
    let enemy = sim.spawn_enemy(ARENA_CENTER + Vec2::new(10.0, 0.0)).unwrap();

    // Contact lands 50 ms after the shield went up.
    let events = sim.tick(0.05);

    assert_eq!(events.parries().collect::<Vec<_>>(), vec![enemy]);
    assert_eq!(player_health(&sim), 100.0);
    assert!(sim.entity(enemy).unwrap().is_stunned());
    assert_eq!(
        sim.entity(enemy).and_then(Entity::hostile).unwrap().behavior,
        BehaviorState::Stunned
    );
}

#[test]
fn test_parry_scores_and_wider_window_is_honored() {
    let mut config = SimConfig::default();
    config.shield.parry_window = 0.3;
    config.player.parry_score = 7;
    let mut sim = arena_with_config(config, ARENA_CENTER);
    assert!(sim.start_shield());
    run_ticks(&mut sim, 12, DT);

    // 200 ms into the shield: a block by default, a parry with the wider window.
    let enemy = sim.spawn_enemy(ARENA_CENTER + Vec2::new(10.0, 0.0)).unwrap();
    let events = sim.tick(DT);

    assert_eq!(events.parries().collect::<Vec<_>>(), vec![enemy]);
    assert_eq!(player_health(&sim), 100.0);
    assert_eq!(sim.player_state().unwrap().score, 7);
}

#[test]
fn test_late_block_reduces_damage() {
    let mut sim = arena_with_player();
    assert!(sim.start_shield());
    run_ticks(&mut sim, 12, DT);

    let enemy = sim.spawn_enemy(ARENA_CENTER + Vec2::new(10.0, 0.0)).unwrap();
    let events = sim.tick(DT);

    assert_eq!(events.parries().count(), 0);
    assert!(events.combat.iter().any(
        |e| matches!(e, CombatEvent::Block { enemy: id, .. } if *id == enemy)
    ));
    let expected = 100.0 - 10.0 * (1.0 - 0.7);
    assert!((player_health(&sim) - expected).abs() < 1e-3);
    assert!(sim.snapshot().player.unwrap().invulnerable);
}

#[test]
fn test_unshielded_contact_damages_once_per_invulnerability_window() {
    let mut sim = arena_with_player();
    sim.spawn_enemy(ARENA_CENTER + Vec2::new(10.0, 0.0)).unwrap();
    sim.tick(DT);
    assert_eq!(player_health(&sim), 90.0);

    // Further contact inside the invulnerability window is ignored.
    run_ticks(&mut sim, 30, DT);
    assert_eq!(player_health(&sim), 90.0);
}

#[test]
fn test_roll_rejected_without_energy() {
    let mut sim = arena_with_player();
    let cost = sim.config().roll.energy_cost;
    while sim.player_state().unwrap().energy >= cost {
        sim.shoot().unwrap();
    }
    let before = sim.entity(sim.player_id().unwrap()).unwrap().position;

    assert!(!sim.roll(Some(Vec2::new(0.0, 1.0))));
    sim.tick(DT);

    let player = sim.entity(sim.player_id().unwrap()).unwrap();
    assert_eq!(player.position, before);
    assert!(!sim.player_state().unwrap().is_rolling());
}

#[test]
fn test_overlapping_enemies_are_separated_in_one_pass() {
    let mut sim = Simulation::new();
    let a = sim.spawn_enemy(Vec2::new(500.0, 500.0)).unwrap();
    let b = sim.spawn_enemy(Vec2::new(510.0, 500.0)).unwrap();
    sim.tick(DT);

    let pa = sim.entity(a).unwrap().position;
    let pb = sim.entity(b).unwrap().position;
    assert!(pa.distance(pb) >= 30.0 - 1e-3);
}

#[test]
fn test_deactivated_projectile_skips_later_pairs() {
    let mut sim = Simulation::new();
    let first = sim.spawn_enemy(Vec2::new(515.0, 505.0)).unwrap();
    let second = sim.spawn_enemy(Vec2::new(515.0, 495.0)).unwrap();
    let shot = sim
        .spawn_projectile(Vec2::new(500.0, 500.0), Vec2::X, 25.0, None)
        .unwrap();

    let events = sim.tick(DT);

    let hits: Vec<_> = events
        .combat
        .iter()
        .filter(|e| matches!(e, CombatEvent::Damage { .. }))
        .collect();
    assert_eq!(hits.len(), 1);
    assert_eq!(events.damage_to(first), 25.0);
    assert_eq!(events.damage_to(second), 0.0);
    assert!(events.removed.contains(&shot));
}

#[test]
fn test_melee_swing_strikes_each_enemy_once() {
    let mut sim = arena_with_player();
    let enemy = sim.spawn_enemy(ARENA_CENTER + Vec2::new(50.0, 0.0)).unwrap();
    sim.set_aim_point(ARENA_CENTER + Vec2::new(200.0, 0.0));
    assert!(sim.attack());

    run_ticks(&mut sim, 20, DT);

    let health = sim.entity(enemy).unwrap().health.current();
    assert_eq!(health, 20.0);
}

#[test]
fn test_melee_ignores_enemies_behind_the_player() {
    let mut sim = arena_with_player();
    let behind = sim.spawn_enemy(ARENA_CENTER - Vec2::new(50.0, 0.0)).unwrap();
    sim.set_aim_point(ARENA_CENTER + Vec2::new(200.0, 0.0));
    assert!(sim.attack());

    let events = sim.tick(DT);

    assert_eq!(events.damage_to(behind), 0.0);
    assert_eq!(sim.metrics().melee_hits, 0);
}

#[test]
fn test_projectile_kill_credits_owner() {
    let mut sim = arena_with_player();
    let enemy = sim.spawn_enemy(ARENA_CENTER + Vec2::new(150.0, 0.0)).unwrap();

    for _ in 0..4 {
        let Some(target) = sim.entity(enemy).map(|e| e.position) else {
            break;
        };
        sim.set_aim_point(target);
        sim.shoot().unwrap();
        run_ticks(&mut sim, 30, DT);
    }

    assert!(sim.entity(enemy).is_none());
    let state = sim.player_state().unwrap();
    assert_eq!(state.kills, 1);
    assert_eq!(state.score, sim.config().player.kill_score);
}

#[test]
fn test_power_up_pickup_grants_buff_and_score() {
    let mut sim = arena_with_player();
    let pickup = sim
        .spawn_power_up(ARENA_CENTER + Vec2::new(10.0, 0.0), PowerUpKind::Speed)
        .unwrap();

    let events = sim.tick(DT);

    assert!(events.combat.contains(&CombatEvent::PowerUpCollected {
        power_up: pickup,
        kind: PowerUpKind::Speed,
    }));
    let snap = sim.snapshot();
    let player = snap.player.as_ref().unwrap();
    assert_eq!(player.speed_multiplier, 1.5);
    assert_eq!(player.score, sim.config().player.pickup_score);
    assert!(snap.entity(pickup).is_none());
}

#[test]
fn test_power_up_expires() {
    let mut sim = Simulation::new();
    let pickup = sim
        .spawn_power_up(Vec2::new(300.0, 300.0), PowerUpKind::Health)
        .unwrap();
    run_ticks(&mut sim, 119, 0.25);
    assert!(sim.entity(pickup).is_some());
    run_ticks(&mut sim, 2, 0.25);
    assert!(sim.entity(pickup).is_none());
}

#[test]
fn test_wolf_lunge_hits_player_once() {
    let mut sim = arena_with_player();
    let wolf = sim.spawn_wolf(ARENA_CENTER + Vec2::new(80.0, 0.0), false).unwrap();

    sim.tick(DT);
    assert!(sim.snapshot().entity(wolf).unwrap().lunging);

    run_ticks(&mut sim, 29, DT);
    assert_eq!(player_health(&sim), 85.0);
}

#[test]
fn test_wolf_outside_alert_radius_stays_idle() {
    let mut sim = arena_with_player();
    let wolf = sim.spawn_wolf(ARENA_CENTER + Vec2::new(700.0, 0.0), false).unwrap();
    let start = sim.entity(wolf).unwrap().position;
    run_ticks(&mut sim, 10, DT);
    assert_eq!(sim.entity(wolf).unwrap().position, start);
}

#[test]
fn test_enemy_steers_toward_entity_target() {
    let mut sim = Simulation::new();
    let enemy = sim.spawn_enemy(Vec2::new(500.0, 500.0)).unwrap();
    let bait = sim.spawn_obstacle(Vec2::new(500.0, 900.0), 20.0, false).unwrap();
    assert!(sim.set_enemy_target(enemy, Some(EnemySteering::Entity(bait))));

    run_ticks(&mut sim, 30, DT);
    assert!(sim.entity(enemy).unwrap().position.y > 550.0);

    // Losing the steering target leaves the enemy idle.
    sim.remove_entity(bait);
    run_ticks(&mut sim, 2, DT);
    assert_eq!(
        sim.entity(enemy).and_then(Entity::hostile).unwrap().behavior,
        BehaviorState::Idle
    );
}

#[test]
fn test_obstacle_blocks_player() {
    let mut sim = arena_with_player();
    sim.spawn_obstacle(ARENA_CENTER + Vec2::new(100.0, 0.0), 40.0, false)
        .unwrap();
    sim.set_movement_intent(Vec2::X);
    run_ticks(&mut sim, 120, DT);

    let player = sim.entity(sim.player_id().unwrap()).unwrap();
    assert!(player.position.x <= ARENA_CENTER.x + 100.0 - 60.0 + 1e-2);
}

#[test]
fn test_player_confined_to_world() {
    let mut sim = arena_with_player();
    sim.set_movement_intent(Vec2::new(-1.0, -1.0));
    run_ticks(&mut sim, 600, DT);

    let snap = sim.snapshot();
    let player = snap.player.as_ref().unwrap();
    assert!((player.position.x - 20.0).abs() < 1e-3);
    assert!((player.position.y - 20.0).abs() < 1e-3);
    assert_eq!(snap.camera.x, 0.0);
    assert_eq!(snap.camera.y, 0.0);
}

#[test]
fn test_target_button_short_and_long_press() {
    let mut sim = arena_with_player();
    let near = sim.spawn_enemy(ARENA_CENTER + Vec2::new(100.0, 0.0)).unwrap();
    let far = sim.spawn_enemy(ARENA_CENTER + Vec2::new(0.0, 200.0)).unwrap();
    sim.tick(DT);
    assert_eq!(sim.current_target(), Some(near));

    sim.press_target_button();
    sim.tick(DT);
    assert!(matches!(sim.release_target_button(), ButtonOutcome::Cycled(Some(id)) if id == far));

    sim.press_target_button();
    run_ticks(&mut sim, 40, DT);
    assert_eq!(sim.release_target_button(), ButtonOutcome::Disabled);
    assert_eq!(sim.current_target(), None);
    assert!(!sim.targeting_enabled());
}

#[test]
fn test_snapshot_serializes_to_json() {
    let mut sim = arena_with_player();
    sim.spawn_enemy(ARENA_CENTER + Vec2::new(120.0, 40.0)).unwrap();
    sim.tick(DT);

    let json = serde_json::to_string(&sim.snapshot()).unwrap();
    let back: Snapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(back.tick, 1);
    assert_eq!(back.entities.len(), 2);
}
