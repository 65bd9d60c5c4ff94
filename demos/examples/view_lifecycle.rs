// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! View lifecycle glue on a single bus.
//!
//! This example shows how to:
//! - bind handlers that tear themselves down when another event fires,
//! - defer repaints to the next frame and pump them from a host loop,
//! - attach handlers to row objects without keeping the rows alive.
//!
//! Run:
//! - `RUST_LOG=understory_eventivity=trace cargo run -p understory_eventivity_demos --example view_lifecycle`

use std::cell::RefCell;
use std::rc::Rc;

use tracing_subscriber::EnvFilter;
use understory_eventivity::{
    Bus, Call, EventOptions, HandlerOptions, ObjectOptions, Outcome, OwnerKey, PathContext,
};

/// Arguments carried by every event in this demo.
#[derive(Clone, Debug)]
enum Msg {
    User(&'static str),
    Size(u32, u32),
    Click,
}

fn main() -> Result<(), understory_eventivity::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let bus: Bus<Msg, String> = Bus::new();
    let handler = bus.handler(HandlerOptions::new());
    let event = bus.event(EventOptions::new());
    let screen = Rc::new(RefCell::new(Vec::<String>::new()));

    // Login installs a greeting that lives until the user opens their profile.
    let s = screen.clone();
    let _ = bus
        .handler(HandlerOptions::new().owned_by("view.profile").named("greet"))
        .on("view")
        .seg("login")
        .bind(move |call: &Call<'_, Msg, String>| {
            let line = match call.args.first() {
                Some(Msg::User(name)) => format!("welcome back, {name}"),
                _ => "welcome".to_owned(),
            };
            s.borrow_mut().push(line.clone());
            Outcome::Value(line)
        });

    let s = screen.clone();
    let _ = handler
        .on("view")
        .seg("profile")
        .bind(move |_: &Call<'_, Msg, String>| {
            s.borrow_mut().push("profile opened".to_owned());
            Outcome::Value(String::new())
        });

    // Repaints wait for the next frame.
    let s = screen.clone();
    let _ = bus
        .handler(HandlerOptions::new().on_frame())
        .on("window")
        .seg("resize")
        .bind(move |call: &Call<'_, Msg, String>| {
            if let Some(Msg::Size(w, h)) = call.args.first() {
                let at = call.frame_time.unwrap_or_default();
                s.borrow_mut().push(format!("repaint {w}x{h} at {at}ms"));
            }
            Outcome::Value(String::new())
        });

    let raised = event.on("view").seg("login").raise(Msg::User("ada"))?;
    if let Some(greeting) = raised.results().and_then(|r| r.get("greet")) {
        println!("greet -> {:?}", greeting.value());
    }
    let _ = event.on("window").seg("resize").raise(Msg::Size(800, 600))?;
    let _ = event.on("window").seg("resize").raise(Msg::Size(1024, 768))?;
    println!("pending before frame: {:?}", bus.pending());

    // Host loop: one frame.
    let ran = bus.run_frame(16.6)?;
    println!("frame ran {ran} deferred call(s)");

    let _ = event.on("view").seg("profile").raise(Msg::Click)?;
    // The greeting is gone.
    let _ = event.on("view").seg("login").recall()?;
    println!(
        "login handlers after profile: {:?}",
        bus.handlers_at("view.login")
    );

    // Row objects: handlers vanish with the row, or with the list reset.
    let objects = bus.object();
    let rows: Vec<Rc<&'static str>> = vec![Rc::new("alpha"), Rc::new("beta")];
    let s = screen.clone();
    let _deleters = objects.handler_with(
        move |call| {
            if let Some(name) = call.object.downcast_ref::<&'static str>() {
                s.borrow_mut().push(format!("clicked {name}"));
            }
            Outcome::Value(String::new())
        },
        ObjectOptions::new().owned_by("list.reset"),
        &rows,
    );
    objects.event(&[Msg::Click], &rows[..1])?;
    println!(
        "owners of list.reset: {}",
        bus.owners_of(&OwnerKey::from("list.reset"))
    );
    let _ = event.on("list").seg("reset").raise(Msg::Click)?;
    objects.event(&[Msg::Click], &rows)?;

    for line in screen.borrow().iter() {
        println!("{line}");
    }
    Ok(())
}
