use super::handlers::{food_records, health, profile, user_login, user_register, ErrorEnvelope};
use super::storage::FoodRecord;
use utoipa::{
    openapi::{
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
        Contact, License,
    },
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        user_register::register,
        user_login::login,
        profile::profile,
        food_records::create,
        food_records::list,
        food_records::update,
        food_records::delete,
    ),
    components(schemas(ErrorEnvelope, FoodRecord)),
    modifiers(&BearerAuth, &CargoInfo),
    tags(
        (name = "health", description = "Service and database status"),
        (name = "register", description = "Account creation"),
        (name = "login", description = "Password login and token issuance"),
        (name = "profile", description = "The authenticated account"),
        (name = "food-records", description = "Owner-scoped meal-log entries"),
    )
)]
struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

// Use Cargo.toml metadata instead of the crate info defaults.
struct CargoInfo;

impl Modify for CargoInfo {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let info = &mut openapi.info;
        info.title = env!("CARGO_PKG_NAME").to_string();
        info.version = env!("CARGO_PKG_VERSION").to_string();
        info.description = non_empty(env!("CARGO_PKG_DESCRIPTION")).map(str::to_string);
        info.contact = cargo_contact();
        info.license = non_empty(env!("CARGO_PKG_LICENSE")).map(|identifier| {
            let mut license = License::new(identifier);
            license.identifier = Some(identifier.to_string());
            license
        });
    }
}

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.find('<') {
        Some(start) => (
            non_empty(&author[..start]),
            non_empty(author[start + 1..].trim_end_matches('>')),
        ),
        None => (non_empty(author), None),
    }
}
