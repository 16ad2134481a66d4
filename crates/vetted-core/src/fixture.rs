//! Demonstration data set

use crate::entity::{Person, Thing};
use crate::validation::RawRecord;
use serde_json::json;

/// Mike, Rana and Biju
pub fn people() -> Vec<Person> {
    vec![
        Person::new(12312, "Mike", "Smith", 'M', 35),
        Person::new(45674, "Rana", "Sen", 'M', 22),
        Person::new(87609, "Biju", "Mandal", 'F', 23),
    ]
}

/// Car and Mug belong to Mike, Bike to Biju
pub fn things() -> Vec<Thing> {
    vec![
        Thing::new(1, "Car", 12312),
        Thing::new(4, "Bike", 87609),
        Thing::new(3, "Mug", 12312),
    ]
}

/// Three raw users, each failing a different rule: username length,
/// non-negative age, contact presence
pub fn rejected_users() -> Vec<RawRecord> {
    let records = [
        json!({
            "username": "sayak", "password": "qwe", "age": 20, "score": 95,
            "email": "emailemail",
        }),
        json!({
            "username": "ranasen", "password": "asdf", "age": -2, "score": 89,
            "email": "ranasen@mail",
        }),
        json!({"username": "zombies", "password": "owfieha", "age": 12, "score": 77}),
    ];

    records
        .into_iter()
        .filter_map(|r| match r {
            serde_json::Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}
