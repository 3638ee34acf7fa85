//! Property tests for registry operations.
//!
//! These tests use `proptest` to generate random sequences of registry
//! operations and verify that entity and component bookkeeping stays exact.

use std::collections::HashMap;

use proptest::prelude::*;
use tessera_ecs::prelude::*;

#[derive(Debug, Clone, PartialEq)]
struct Pos {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct Vel {
    dx: f32,
    dy: f32,
}

/// Operations we can perform on the registry.
#[derive(Debug, Clone)]
enum EcsOp {
    Create,
    CreatePos(f32, f32),
    Destroy(usize),
    EmplaceOrReplaceVel(usize, f32, f32),
    RemoveVel(usize),
    SelectPosVel,
}

/// Strategy that generates finite (non-NaN, non-Inf) f32 values.
fn finite_f32() -> impl Strategy<Value = f32> {
    (-1_000_000i32..1_000_000i32).prop_map(|v| v as f32 * 0.01)
}

fn ecs_op_strategy() -> impl Strategy<Value = EcsOp> {
    prop_oneof![
        Just(EcsOp::Create),
        (finite_f32(), finite_f32()).prop_map(|(x, y)| EcsOp::CreatePos(x, y)),
        (0..100usize).prop_map(EcsOp::Destroy),
        (0..100usize, finite_f32(), finite_f32())
            .prop_map(|(i, dx, dy)| EcsOp::EmplaceOrReplaceVel(i, dx, dy)),
        (0..100usize).prop_map(EcsOp::RemoveVel),
        Just(EcsOp::SelectPosVel),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn registry_random_ops_track_model(ops in prop::collection::vec(ecs_op_strategy(), 1..60)) {
        let mut reg = Registry::new();
        let mut alive: Vec<Entity> = Vec::new();
        let mut pos: HashMap<Entity, Pos> = HashMap::new();
        let mut vel: HashMap<Entity, Vel> = HashMap::new();

        for op in ops {
            match op {
                EcsOp::Create => alive.push(reg.create()),
                EcsOp::CreatePos(x, y) => {
                    let e = reg.create();
                    reg.emplace(e, Pos { x, y });
                    pos.insert(e, Pos { x, y });
                    alive.push(e);
                }
                EcsOp::Destroy(idx) => {
                    if !alive.is_empty() {
                        let e = alive.remove(idx % alive.len());
                        reg.destroy(e);
                        pos.remove(&e);
                        vel.remove(&e);
                    }
                }
                EcsOp::EmplaceOrReplaceVel(idx, dx, dy) => {
                    if !alive.is_empty() {
                        let e = alive[idx % alive.len()];
                        reg.emplace_or_replace(e, Vel { dx, dy });
                        vel.insert(e, Vel { dx, dy });
                    }
                }
                EcsOp::RemoveVel(idx) => {
                    if !alive.is_empty() {
                        let e = alive[idx % alive.len()];
                        prop_assert_eq!(reg.remove_if_exists::<Vel>(e), vel.remove(&e));
                    }
                }
                EcsOp::SelectPosVel => {
                    let selected = reg.select(&Selector::new().with::<Pos>().with::<Vel>());
                    let expected = alive
                        .iter()
                        .filter(|&e| pos.contains_key(e) && vel.contains_key(e))
                        .count();
                    prop_assert_eq!(selected.len(), expected);
                }
            }

            prop_assert_eq!(reg.entity_count(), alive.len());
            prop_assert_eq!(reg.view::<Pos>().count(), pos.len());
            prop_assert_eq!(reg.view::<Vel>().count(), vel.len());
            for &e in &alive {
                prop_assert!(reg.valid(e));
                prop_assert_eq!(reg.try_get::<Pos>(e), pos.get(&e));
                prop_assert_eq!(reg.try_get::<Vel>(e), vel.get(&e));
            }
        }
    }

    /// Destroyed handles stay invalid even after their slots are recycled.
    #[test]
    fn stale_ids_detected_after_destroy_and_recycle(
        spawn_count in 1..20usize,
        destroy_indices in prop::collection::vec(0..20usize, 1..10),
    ) {
        let mut reg = Registry::new();

        let mut entities: Vec<Entity> = Vec::new();
        for i in 0..spawn_count {
            let e = reg.create();
            reg.emplace(e, Pos { x: i as f32, y: 0.0 });
            entities.push(e);
        }

        let mut stale: Vec<Entity> = Vec::new();
        for &idx in &destroy_indices {
            if !entities.is_empty() {
                let e = entities.remove(idx % entities.len());
                reg.destroy(e);
                stale.push(e);
            }
        }

        for _ in 0..stale.len() {
            let e = reg.create();
            reg.emplace(e, Pos { x: 999.0, y: 999.0 });
            entities.push(e);
        }

        for &e in &stale {
            prop_assert!(!reg.valid(e));
            prop_assert_eq!(
                reg.fetch::<Pos>(e).unwrap_err(),
                EcsError::StaleEntity { entity: e }
            );
            prop_assert!(reg.try_destroy(e).is_err());
        }
        for &e in &entities {
            prop_assert!(reg.valid(e));
            prop_assert!(reg.has::<Pos>(e));
        }
    }
}
