//! Counter Example - reducer state driven by key presses
//!
//! This example demonstrates:
//! - Function components with `use_reducer` / `use_state`
//! - Keyed lists that grow, shrink and reverse
//! - keydown listeners buffering updates for the next tick
//!
//! Keys: `+` / `-` change the counter, `r` reverses the list, Esc quits.
//!
//! Run with: cargo run --example counter

use spark_reconciler::{
    component, host, mount, run, Component, MountConfig, Node, Props, RenderMode,
};

#[derive(Clone, Copy)]
enum Action {
    Increment,
    Decrement,
}

fn counter(count: &i64, action: Action) -> i64 {
    match action {
        Action::Increment => count + 1,
        Action::Decrement => (count - 1).max(0),
    }
}

fn item_row() -> Component {
    Component::new("ItemRow", |_hooks, props: &Props| {
        let label = props
            .get("label")
            .and_then(|value| value.as_text())
            .unwrap_or_default();
        host("text").child(format!("- {label}")).into()
    })
}

fn app() -> Component {
    let row = item_row();
    Component::new("App", move |hooks, _props| {
        let (count, dispatch) = hooks.use_reducer(counter, 3);
        let (reversed, set_reversed) = hooks.use_state(false);

        let mut ids: Vec<i64> = (1..=count).collect();
        if reversed {
            ids.reverse();
        }
        let rows: Vec<Node> = ids
            .into_iter()
            .map(|id| {
                component(&row)
                    .key(id)
                    .prop("label", format!("item {id}"))
                    .into()
            })
            .collect();

        host("box")
            .style("flexDirection", "column")
            .style("padding", "1")
            .style("gap", "1")
            .on("keydown", move |event| match event.detail() {
                Some("+") => dispatch.dispatch(Action::Increment),
                Some("-") => dispatch.dispatch(Action::Decrement),
                Some("r") => set_reversed.dispatch(!reversed),
                _ => {}
            })
            .child(host("text").child(format!("count: {count}  (+/- r, Esc quits)")))
            .child(host("box").children(rows))
            .into()
    })
}

fn main() -> std::io::Result<()> {
    let app = app();
    let mut handle = mount(
        component(&app),
        MountConfig {
            mode: RenderMode::Fullscreen,
            ..Default::default()
        },
    )?;
    run(&mut handle)?;
    handle.unmount();
    Ok(())
}
