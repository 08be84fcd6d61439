use std::sync::Arc;

use dojo::model::Profile;
use dojo::roster::RosterSync;
use dojo::store::MemoryStore;

fn main() {
    let store = MemoryStore::new();

    let sub = RosterSync::subscribe(
        Arc::new(store.clone()),
        Arc::new(|roster| {
            let entries: Vec<String> = roster
                .iter()
                .map(|r| format!("{} ({})", r.profile.full_name, r.key))
                .collect();
            println!("roster: [{}]", entries.join(", "));
        }),
        Arc::new(|error| println!("roster error: {error}")),
    );

    let ana = store.create_student(profile("Ana", Some("orange")));
    let bia = store.create_student(profile("Bia", None));

    store.put_profile(bia, profile("Bia", Some("green")));

    store.remove_profile(&ana);
    store.remove_student(&ana);

    sub.cancel();

    // nothing after teardown
    store.create_student(profile("Caio", None));

    println!("done");
}

fn profile(name: &str, belt: Option<&str>) -> Profile {
    Profile {
        full_name: name.to_string(),
        belt: belt.map(str::to_string),
        ..Profile::default()
    }
}
