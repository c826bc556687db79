//! Patrol Agent
//!
//! This example drives a small NPC brain built as a state hierarchy.
//!
//! Key concepts:
//! - Root data plan seeding shared variables
//! - Behaviors signalling completion through their finished event
//! - Guards consulted before switching states
//! - Root-bound dispatch from any depth
//!
//! Run with: RUST_LOG=debug cargo run --example patrol_agent

use mindset_hsm::action::{Action, ExecutionContext};
use mindset_hsm::core::{AgentRef, Payload, StateContext};
use mindset_hsm::scope::{Scope, ScopePlan, VarSpec, VarType};
use mindset_hsm::{StateBehavior, StateBuilder, StateId, StateTree, TreeConfig};
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

struct Npc {
    name: String,
}

/// Walks a fixed number of waypoints, then reports it is done.
struct Patrol {
    waypoints: u32,
    visited: u32,
}

impl StateBehavior for Patrol {
    fn enter(&mut self, _ctx: &mut StateContext<'_>) {
        self.visited = 0;
    }

    fn update(&mut self, ctx: &mut StateContext<'_>, _delta: f64) {
        self.visited += 1;
        println!("  [{}] waypoint {}/{}", ctx.name(), self.visited, self.waypoints);
        if self.visited >= self.waypoints {
            ctx.scope().set("alert_level", 1);
            let finished = ctx.event_finished();
            ctx.dispatch(&finished, ());
        }
    }
}

struct DrawWeapon;

impl Action for DrawWeapon {
    fn execute(&self, ctx: &mut ExecutionContext<'_>) {
        ctx.scope().set("weapon_drawn", true);
    }

    fn revert(&self, ctx: &mut ExecutionContext<'_>) {
        ctx.scope().set("weapon_drawn", false);
    }

    fn is_revertible(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "DrawWeapon"
    }
}

fn switch(tree: &mut StateTree, from: StateId, to: StateId) -> bool {
    if !tree.check_guard(to) {
        println!("  guard refused {:?}", tree.name(to));
        return false;
    }
    tree.exit(from).is_ok() && tree.enter(to).is_ok()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("=== Patrol Agent ===\n");

    let mut tree = StateTree::with_config(TreeConfig::default().recording());
    let plan = ScopePlan::new()
        .with_var("hp", VarSpec::new(VarType::Int, 100).with_hint("hit points"))
        .with_var("alert_level", VarSpec::typed(VarType::Int));

    let brain = StateBuilder::new("Brain")
        .plan(plan)
        .child(StateBuilder::new("Patrol").behavior(Patrol {
            waypoints: 3,
            visited: 0,
        }))
        .child(
            StateBuilder::new("Chase")
                .guard(|tree: &StateTree, id| {
                    tree.scope(id)
                        .and_then(|scope| scope.get_as::<i64>("alert_level"))
                        .is_some_and(|level| level > 0)
                })
                .on_enter_action(DrawWeapon)
                .call_on_enter(|| println!("  >> target spotted, chasing")),
        )
        .build(&mut tree)
        .unwrap();

    let patrol = tree.find_child(brain, "Patrol").unwrap();
    let chase = tree.find_child(brain, "Chase").unwrap();

    let finished = tree.event_finished(patrol).unwrap().to_string();
    tree.add_event_handler(brain, &finished, move |tree: &mut StateTree, _: &Payload| {
        switch(tree, patrol, chase)
    })
    .unwrap();
    tree.add_event_handler(brain, "damage", move |tree: &mut StateTree, payload: &Payload| {
        let Some(amount) = payload.as_i64() else {
            return false;
        };
        let Some(scope) = tree.scope(brain) else {
            return false;
        };
        let hp = scope.get_as::<i64>("hp").unwrap_or_default() - amount;
        scope.set("hp", hp);
        println!("  took {} damage, hp now {}", amount, hp);
        true
    })
    .unwrap();

    let npc = Rc::new(Npc {
        name: "sentry".to_string(),
    });
    let world = Scope::new();
    world.set("map", "forest");
    tree.initialize_subtree(brain, AgentRef::new(&npc), &world)
        .unwrap();
    println!("Agent '{}' initialized", npc.name);

    println!("Guard before patrol: chase allowed = {}\n", tree.check_guard(chase));

    tree.enter(brain).unwrap();
    tree.enter(patrol).unwrap();
    for _ in 0..3 {
        tree.update(patrol, 0.016).unwrap();
    }

    let scope = tree.scope(chase).unwrap();
    println!("\nPatrol active: {}", tree.is_active(patrol));
    println!("Chase active: {}", tree.is_active(chase));
    println!("Weapon drawn: {:?}", scope.get("weapon_drawn"));
    println!("Map (from world scope): {:?}", scope.get("map"));

    println!("\nDispatching 'damage' from Chase (handled at Brain):");
    tree.dispatch(chase, "damage", 25);

    tree.exit(chase).unwrap();
    println!("Weapon drawn after exit: {:?}", scope.get("weapon_drawn"));

    println!("\nEntered path: {:?}", tree.lifecycle_log().entered_path());
    println!("Recorded {} lifecycle events", tree.lifecycle_log().len());

    println!("\n=== Example Complete ===");
}
