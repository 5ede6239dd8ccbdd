use clap::{Arg, ArgMatches, Command, builder::PossibleValuesParser, value_parser};
use mongodb::bson::Document;
use serde::Serialize;

use crate::config::ConnectConfig;
use crate::db::{AuthStyle, with_session};
use crate::errors::StoreError;
use crate::models::{GROUP_COLLECTION, Group, USER_COLLECTION, User, UserChanges};
use crate::ops;
use crate::scenarios::{self, DUPLICATE_ID_RANGE, DuplicateOutcome, ID_RANGE, SCENARIO_NAMES};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

pub fn cli() -> Command {
    Command::new("mongocoba")
        .about("Exercise a MongoDB server with simple CRUD calls")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(global("host", "Server host (MONGO_HOST)", "HOST"))
        .arg(global("port", "Server port (MONGO_PORT)", "PORT").value_parser(value_parser!(u16)))
        .arg(global("user", "Account name (MONGO_USER)", "USER"))
        .arg(global("pass", "Account password (MONGO_PASS)", "PASS"))
        .arg(global("db", "Target database (MONGO_DB)", "DB"))
        .arg(global(
            "auth-source",
            "Database the account is defined in (MONGO_AUTH_SOURCE)",
            "DB",
        ))
        .arg(
            global("auth", "How credentials are passed to the driver", "STYLE")
                .value_parser(["uri", "credential"])
                .default_value("credential"),
        )
        .subcommand(Command::new("ping").about("Connect, authenticate and disconnect"))
        .subcommand(
            Command::new("insert-user")
                .about("Insert one user into mst_user")
                .arg(required("id").value_parser(value_parser!(i64)))
                .arg(required("name"))
                .arg(required("email")),
        )
        .subcommand(
            Command::new("insert-group")
                .about("Insert one group into mst_group")
                .arg(required("group-id"))
                .arg(required("name"))
                .arg(required("email")),
        )
        .subcommand(
            Command::new("find-users")
                .about("Print users matching every given field, one JSON object per line")
                .arg(optional("name"))
                .arg(optional("email")),
        )
        .subcommand(
            Command::new("find-groups")
                .about("Print groups matching every given field, one JSON object per line")
                .arg(optional("name"))
                .arg(optional("group-id")),
        )
        .subcommand(
            Command::new("update-user")
                .about("Set fields on the first user with the given name")
                .arg(required("name"))
                .arg(optional("set-name"))
                .arg(optional("set-email")),
        )
        .subcommand(
            Command::new("delete-user")
                .about("Delete the first user with the given name")
                .arg(required("name")),
        )
        .subcommand(
            Command::new("scenario").about("Run a scripted exercise").arg(
                Arg::new("name")
                    .required(true)
                    .value_parser(PossibleValuesParser::new(
                        SCENARIO_NAMES.iter().copied().chain(["all"]),
                    )),
            ),
        )
}

fn global(name: &'static str, help: &'static str, value_name: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .help(help)
        .value_name(value_name)
        .global(true)
}

fn required(name: &'static str) -> Arg {
    Arg::new(name).long(name).required(true)
}

fn optional(name: &'static str) -> Arg {
    Arg::new(name).long(name)
}

/// Applies command-line overrides on top of `base`.
pub fn config_from_matches(matches: &ArgMatches, base: ConnectConfig) -> ConnectConfig {
    let mut config = base;

    if let Some(host) = matches.get_one::<String>("host") {
        config.host = host.clone();
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.port = *port;
    }
    if let Some(user) = matches.get_one::<String>("user") {
        config.user = user.clone();
    }
    if let Some(pass) = matches.get_one::<String>("pass") {
        config.pass = pass.clone();
    }
    if let Some(db) = matches.get_one::<String>("db") {
        config.db = db.clone();
    }
    if let Some(auth_source) = matches.get_one::<String>("auth-source") {
        config.auth_source = auth_source.clone();
    }

    config
}

pub fn auth_style(matches: &ArgMatches) -> Result<AuthStyle, StoreError> {
    matches
        .get_one::<String>("auth")
        .map(|s| s.parse())
        .unwrap_or(Ok(AuthStyle::default()))
}

/// Builds an equality filter from whichever of `fields` were given.
fn filter_from(matches: &ArgMatches, fields: &[(&str, &str)]) -> Document {
    let mut filter = Document::new();
    for (arg, attribute) in fields {
        if let Some(value) = matches.get_one::<String>(arg) {
            filter.insert(*attribute, value.clone());
        }
    }
    filter
}

fn print_json_lines<T: Serialize>(records: &[T]) -> CliResult<()> {
    for record in records {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}

pub async fn handle_cli() -> CliResult<()> {
    let matches = cli().get_matches();
    let config = config_from_matches(&matches, ConnectConfig::from_env()?);
    let style = auth_style(&matches)?;

    match matches.subcommand() {
        Some(("ping", _)) => {
            let report = scenarios::connect(&config, style).await?;
            println!(
                "Connected to `{}` ({} auth), {} collections",
                report.database,
                report.style,
                report.collections.len()
            );
        }
        Some(("insert-user", sub)) => {
            let user = User::new(
                *sub.get_one::<i64>("id").ok_or("missing --id")?,
                sub.get_one::<String>("name").ok_or("missing --name")?,
                sub.get_one::<String>("email").ok_or("missing --email")?,
            );
            let ack = with_session(&config, style, |db| async move {
                ops::insert_one(&db, USER_COLLECTION, &user).await
            })
            .await?;
            println!("Inserted user with _id {}", ack.inserted_id);
        }
        Some(("insert-group", sub)) => {
            let group = Group::new(
                sub.get_one::<String>("group-id").ok_or("missing --group-id")?,
                sub.get_one::<String>("name").ok_or("missing --name")?,
                sub.get_one::<String>("email").ok_or("missing --email")?,
            );
            let ack = with_session(&config, style, |db| async move {
                ops::insert_one(&db, GROUP_COLLECTION, &group).await
            })
            .await?;
            println!("Inserted group with _id {}", ack.inserted_id);
        }
        Some(("find-users", sub)) => {
            let filter = filter_from(sub, &[("name", User::NAME), ("email", User::EMAIL)]);
            let users = with_session(&config, style, |db| async move {
                ops::find::<User>(&db, USER_COLLECTION, filter).await?.collect().await
            })
            .await?;
            print_json_lines(&users)?;
        }
        Some(("find-groups", sub)) => {
            let filter = filter_from(sub, &[("name", Group::NAME), ("group-id", Group::GROUP_ID)]);
            let groups = with_session(&config, style, |db| async move {
                ops::find::<Group>(&db, GROUP_COLLECTION, filter).await?.collect().await
            })
            .await?;
            print_json_lines(&groups)?;
        }
        Some(("update-user", sub)) => {
            let name = sub.get_one::<String>("name").ok_or("missing --name")?;
            let changes = UserChanges {
                name: sub.get_one::<String>("set-name").cloned(),
                email: sub.get_one::<String>("set-email").cloned(),
            };
            let filter = ops::eq_filter(User::NAME, name.as_str());
            let summary = with_session(&config, style, |db| async move {
                ops::set_fields(&db, USER_COLLECTION, filter, &changes).await
            })
            .await?;
            println!(
                "Matched {}, modified {}",
                summary.matched, summary.modified
            );
        }
        Some(("delete-user", sub)) => {
            let name = sub.get_one::<String>("name").ok_or("missing --name")?;
            let filter = ops::eq_filter(User::NAME, name.as_str());
            let summary = with_session(&config, style, |db| async move {
                ops::delete_one(&db, USER_COLLECTION, filter).await
            })
            .await?;
            println!("Deleted {}", summary.deleted);
        }
        Some(("scenario", sub)) => {
            let name = sub.get_one::<String>("name").ok_or("missing scenario name")?;
            if name == "all" {
                for name in SCENARIO_NAMES {
                    run_scenario(name, &config, style).await?;
                }
            } else {
                run_scenario(name, &config, style).await?;
            }
        }
        _ => {
            cli().print_help()?;
        }
    }

    Ok(())
}

async fn run_scenario(name: &str, config: &ConnectConfig, style: AuthStyle) -> CliResult<()> {
    tracing::info!(scenario = name, "running scenario");

    match name {
        "connect" => {
            let report = scenarios::connect(config, style).await?;
            println!("connect: {report:?}");
        }
        "insert" => {
            let user = User::numbered(scenarios::random_id(ID_RANGE));
            let ack = scenarios::insert_user(config, &user).await?;
            println!("insert: {user:?} -> {}", ack.inserted_id);
        }
        "duplicate" => {
            let id = scenarios::random_id(DUPLICATE_ID_RANGE);
            match scenarios::insert_duplicate(config, id).await? {
                DuplicateOutcome::Rejected { user, message } => {
                    println!("duplicate: second insert of {user:?} rejected: {message}");
                }
                DuplicateOutcome::Accepted { user } => {
                    return Err(format!("duplicate: second insert of {user:?} was accepted").into());
                }
            }
        }
        "mixed" => {
            let report = scenarios::insert_mixed(config, scenarios::random_id(ID_RANGE)).await?;
            println!("mixed: {:?} and {:?}", report.user, report.group);
        }
        "read" => {
            let users = scenarios::read_by_name(config, scenarios::random_id(ID_RANGE)).await?;
            println!("read: {users:?}");
        }
        "update" => {
            let user = User::numbered(scenarios::random_id(ID_RANGE));
            scenarios::insert_user(config, &user).await?;
            let changes = UserChanges {
                name: Some(format!("{}-updated", user.name)),
                email: Some(format!("{}-updated", user.email)),
            };
            let summary = scenarios::update_by_name(config, &user.name, &changes).await?;
            println!("update: {summary:?}");
        }
        "delete" => {
            let summary = scenarios::delete_by_name(config, "name").await?;
            println!("delete: {summary:?}");
        }
        other => return Err(format!("unknown scenario `{other}`").into()),
    }

    Ok(())
}
