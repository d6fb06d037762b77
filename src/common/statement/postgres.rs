use crate::util::{quote_identifier, quote_literal};

pub fn terminate_database_connections(db_name: &str) -> String {
    format!(
        "SELECT pg_terminate_backend(pid) AS terminated FROM pg_catalog.pg_stat_activity WHERE datname = {} AND pid <> pg_backend_pid()",
        quote_literal(db_name)
    )
}

pub fn drop_database(db_name: &str, force: bool) -> String {
    let db_name = quote_identifier(db_name);
    if force {
        format!("DROP DATABASE IF EXISTS {db_name} WITH (FORCE)")
    } else {
        format!("DROP DATABASE IF EXISTS {db_name}")
    }
}

pub fn create_database(db_name: &str) -> String {
    format!("CREATE DATABASE {}", quote_identifier(db_name))
}

pub const REDACTED_PASSWORD: &str = "'********'";

pub fn create_role(name: &str, password: &str) -> String {
    role_with_password("CREATE", name, quote_literal(password).as_str())
}

pub fn create_role_redacted(name: &str) -> String {
    role_with_password("CREATE", name, REDACTED_PASSWORD)
}

pub fn update_role(name: &str, password: &str) -> String {
    role_with_password("ALTER", name, quote_literal(password).as_str())
}

pub fn update_role_redacted(name: &str) -> String {
    role_with_password("ALTER", name, REDACTED_PASSWORD)
}

fn role_with_password(verb: &str, name: &str, password_literal: &str) -> String {
    format!(
        "{verb} ROLE {} WITH LOGIN PASSWORD {password_literal}",
        quote_identifier(name)
    )
}

/// `setting` is one of the fixed session default names and is not quoted
pub fn set_role_default(name: &str, setting: &str, value: &str) -> String {
    format!(
        "ALTER ROLE {} SET {setting} TO {}",
        quote_identifier(name),
        quote_literal(value)
    )
}

pub fn grant_all_database_privileges(db_name: &str, role_name: &str) -> String {
    format!(
        "GRANT ALL PRIVILEGES ON DATABASE {} TO {}",
        quote_identifier(db_name),
        quote_identifier(role_name)
    )
}

pub fn drop_role(name: &str) -> String {
    format!("DROP ROLE IF EXISTS {}", quote_identifier(name))
}

pub fn role_exists(name: &str) -> String {
    format!(
        "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_roles WHERE rolname = {}) AS role_exists",
        quote_literal(name)
    )
}

/// One `name=value` row per default stored for the role across all databases
pub fn get_role_settings(name: &str) -> String {
    format!(
        "SELECT unnest(s.setconfig) AS setting FROM pg_catalog.pg_db_role_setting s JOIN pg_catalog.pg_roles r ON r.oid = s.setrole WHERE r.rolname = {} AND s.setdatabase = 0",
        quote_literal(name)
    )
}

/// Privileges of the current user on the database
pub fn get_database_privileges(db_name: &str) -> String {
    let db_name = quote_literal(db_name);
    format!(
        "SELECT has_database_privilege({db_name}, 'CREATE') AS can_create, has_database_privilege({db_name}, 'CONNECT') AS can_connect, has_database_privilege({db_name}, 'TEMPORARY') AS can_temporary"
    )
}
