//! Movement, scheduling and pathing exercised through the world.

use server::entity::{Loc, MovementType, UpdateFlags};
use server::error::CharacterRef;
use server::pathing::{BfsPathfinder, DestinationTile};
use server::task::{run_until_quiescent, CharacterTurn, Event, TaskSlot};
use server::template::{LocTemplate, RegionKeys, SequenceTemplate, StaticTemplates};
use server::world::{CollisionFlags, Tile, World};

const SPAWN: Tile = Tile::new(0, 3222, 3235);

fn world() -> World {
    let mut world = World::new();
    world.load_area(0, (390, 390), (414, 418));
    world
}

fn login(world: &mut World) -> u16 {
    world
        .add_player("tester", SPAWN, &RegionKeys::new(true))
        .unwrap()
}

fn turn(world: &mut World, templates: &StaticTemplates, who: CharacterRef, now: u64) -> u32 {
    let mut pathfinder = BfsPathfinder::new();
    let mut turn = CharacterTurn::new(world, templates, &mut pathfinder, who, now);
    run_until_quiescent(&mut turn, 64).unwrap()
}

#[test]
fn run_consumes_two_tiles_and_walk_one() {
    let mut world = world();
    let index = login(&mut world);
    let path = [SPAWN.offset(1, 0), SPAWN.offset(2, 0)];

    let c = &mut world.players.get_mut(index).unwrap().character;
    c.set_run_mode(true);
    c.set_path(path);
    assert!(world.process_movement().is_empty());
    let c = &world.players.get(index).unwrap().character;
    assert_eq!(c.pos, SPAWN.offset(2, 0));
    assert_eq!(c.movement, MovementType::Run);
    assert!(c.path.is_empty());
    let (first, second) = c.step_directions().unwrap();
    assert_eq!(Some(first), second);

    world.post_process();
    let c = &mut world.players.get_mut(index).unwrap().character;
    c.set_run_mode(false);
    c.set_path(path.map(|t| t.offset(2, 0)));
    world.process_movement();
    let c = &world.players.get(index).unwrap().character;
    assert_eq!(c.pos, SPAWN.offset(3, 0));
    assert_eq!(c.movement, MovementType::Walk);
    assert_eq!(c.path.len(), 1);
}

#[test]
fn moving_between_zones_updates_residency() {
    let mut world = world();
    let index = login(&mut world);
    let before = SPAWN.zone();
    // Zone 402 ends at x 3223, so two steps east cross into zone 403.
    let c = &mut world.players.get_mut(index).unwrap().character;
    c.set_run_mode(true);
    c.set_path([SPAWN.offset(1, 0), SPAWN.offset(2, 0)]);
    world.process_movement();

    let after = world.players.get(index).unwrap().character.pos.zone();
    assert_ne!(before, after);
    assert!(!world.map.zone(before).unwrap().players.contains(&index));
    assert!(world.map.zone(after).unwrap().players.contains(&index));
}

#[test]
fn walking_off_the_loaded_world_is_reverted() {
    let mut world = world();
    let index = login(&mut world);
    let edge = Tile::new(0, 415 * 8 - 1, SPAWN.y);
    world.players.get_mut(index).unwrap().character.teleport(edge);
    world.process_movement();
    world.post_process();
    let before = world.players.get(index).unwrap().character.snapshot_step();

    world
        .players
        .get_mut(index)
        .unwrap()
        .character
        .set_path([edge.offset(1, 0)]);
    let errors = world.process_movement();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, CharacterRef::Player(index));
    let c = &world.players.get(index).unwrap().character;
    assert_eq!(c.pos, edge);
    assert_eq!(c.movement, MovementType::Stay);
    assert_eq!(c.snapshot_step(), before);
    assert!(c.path.is_empty());
    assert!(world.map.zone(edge.zone()).unwrap().players.contains(&index));
}

#[test]
fn second_animation_replaces_the_first() {
    let mut templates = StaticTemplates::new();
    templates.add_sequence(SequenceTemplate { id: 1, duration: 2 });
    templates.add_sequence(SequenceTemplate { id: 2, duration: 6 });
    let mut world = world();
    let index = login(&mut world);
    let who = CharacterRef::Player(index);

    let c = world.character_mut(who).unwrap();
    c.animate(1, 0, 0, &templates).unwrap();
    c.animate(2, 0, 0, &templates).unwrap();
    assert_eq!(c.scheduler.active_slots(), vec![TaskSlot::Sequence]);

    // The first animation's expiry would have fired here.
    turn(&mut world, &templates, who, 2);
    assert_eq!(world.character(who).unwrap().sequence.map(|s| s.id), Some(2));

    turn(&mut world, &templates, who, 6);
    assert!(world.character(who).unwrap().sequence.is_none());
    assert!(world.character(who).unwrap().scheduler.active_slots().is_empty());
}

#[test]
fn chat_raised_during_a_turn_is_handled_in_the_same_turn() {
    let templates = StaticTemplates::new();
    let mut world = world();
    let index = login(&mut world);
    let who = CharacterRef::Player(index);
    let c = world.character_mut(who).unwrap();
    c.scheduler.raise(Event::PublicChat { effects: 0x0102, message: "hi".into() });
    c.scheduler.raise(Event::Walk { x: 3223, y: 3235, run: false });

    turn(&mut world, &templates, who, 1);
    let c = world.character(who).unwrap();
    assert!(!c.scheduler.has_events());
    assert_eq!(c.chat.as_ref().map(|m| m.message.as_str()), Some("hi"));
    assert!(c.scheduler.task(TaskSlot::Chat).is_some());
    assert_eq!(c.path.len(), 1);
}

#[test]
fn arriving_beside_a_large_loc_faces_its_centre() {
    let mut templates = StaticTemplates::new();
    templates.add_loc(LocTemplate {
        id: 1276,
        name: "Tree".into(),
        width: 2,
        length: 2,
        solid: true,
        access_block: 0,
    });
    let mut world = world();
    let index = login(&mut world);
    let who = CharacterRef::Player(index);
    let tree = Tile::new(0, 3224, 3236);
    assert!(world.add_loc(Loc::new(1276, 10, 0, tree), &templates).unwrap());

    world
        .character_mut(who)
        .unwrap()
        .scheduler
        .raise(Event::LocClick { id: 1276, x: 3224, y: 3236, run: false });
    turn(&mut world, &templates, who, 1);
    assert_eq!(world.character(who).unwrap().path.len(), 1);

    world.process_movement();
    world.character_mut(who).unwrap().flags = UpdateFlags::empty();
    turn(&mut world, &templates, who, 2);
    let c = world.character(who).unwrap();
    assert_eq!(c.pos, Tile::new(0, 3223, 3236));
    assert_eq!(c.orientation, 1431);
    assert!(c.flags.contains(UpdateFlags::ORIENTATION));
    assert!(c.scheduler.task(TaskSlot::Normal).is_none());
}

#[test]
fn enclosed_target_without_alternative_leaves_everything_intact() {
    let mut world = world();
    let index = login(&mut world);
    let target = SPAWN.offset(3, 0);
    for dx in -1..=1 {
        for dy in -1..=1 {
            if (dx, dy) != (0, 0) {
                world.add_collision(target.offset(dx, dy), CollisionFlags::OBJECT);
            }
        }
    }
    let flags_before: Vec<_> = (-2..=2)
        .flat_map(|dx| (-2..=2).map(move |dy| (dx, dy)))
        .map(|(dx, dy)| world.collision_flags(0, target.x + dx, target.y + dy))
        .collect();

    let mut pathfinder = BfsPathfinder::new();
    let start = world.players.get(index).unwrap().character.pos;
    assert_eq!(start, SPAWN);
    let path = pathfinder.find_path(start, &DestinationTile(target), 1, false, &world.map);
    assert!(path.is_empty());

    world.players.get_mut(index).unwrap().character.set_path(path);
    assert!(world.process_movement().is_empty());
    let c = &world.players.get(index).unwrap().character;
    assert_eq!(c.pos, SPAWN);
    assert_eq!(c.movement, MovementType::Stay);
    assert!(world.map.zone(SPAWN.zone()).unwrap().players.contains(&index));

    let flags_after: Vec<_> = (-2..=2)
        .flat_map(|dx| (-2..=2).map(move |dy| (dx, dy)))
        .map(|(dx, dy)| world.collision_flags(0, target.x + dx, target.y + dy))
        .collect();
    assert_eq!(flags_before, flags_after);

    // The same buffers still find ordinary paths afterwards.
    let open = SPAWN.offset(0, 4);
    let path = pathfinder.find_path(start, &DestinationTile(open), 1, false, &world.map);
    assert_eq!(path.len(), 4);
    assert_eq!(path.last(), Some(&open));
}
