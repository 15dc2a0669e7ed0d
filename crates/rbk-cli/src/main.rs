use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rbk_config::AppConfig;
use rbk_schemas::{Caller, NewEquipment, NewRoom, Role};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "rbk")]
#[command(about = "RoomBook operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> host...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Account administration
    User {
        #[command(subcommand)]
        cmd: UserCmd,
    },

    /// Room catalog
    Room {
        #[command(subcommand)]
        cmd: RoomCmd,
    },

    /// Equipment catalog
    Equipment {
        #[command(subcommand)]
        cmd: EquipmentCmd,
    },

    /// Reservation inspection
    Reservation {
        #[command(subcommand)]
        cmd: ReservationCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations (idempotent).
    Migrate,
}

#[derive(Subcommand)]
enum UserCmd {
    /// Grant or revoke ADMIN. This is how the first administrator is made.
    SetRole {
        #[arg(long)]
        email: String,

        /// USER | ADMIN
        #[arg(long, value_parser = parse_role)]
        role: Role,
    },

    List,
}

#[derive(Subcommand)]
enum RoomCmd {
    List,

    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        capacity: i16,

        #[arg(long)]
        location: String,

        /// Create the room closed for booking.
        #[arg(long, default_value_t = false)]
        inactive: bool,
    },
}

#[derive(Subcommand)]
enum EquipmentCmd {
    List,

    Add {
        /// Unique short code (e.g. PROJ-01)
        #[arg(long)]
        code: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
enum ReservationCmd {
    /// List reservations; with --room, that room's schedule with holder names.
    List {
        #[arg(long)]
        room: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = connect().await?;
            match cmd {
                DbCmd::Status => {
                    let s = rbk_db::status(&pool).await?;
                    println!(
                        "db_ok={} has_reservations_table={}",
                        s.ok, s.has_reservations_table
                    );
                }
                DbCmd::Migrate => {
                    rbk_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = rbk_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::User { cmd } => {
            let pool = connect().await?;
            match cmd {
                UserCmd::SetRole { email, role } => {
                    let creds = rbk_db::find_user_by_email(&pool, &email)
                        .await?
                        .with_context(|| format!("no user with email {email}"))?;
                    let user =
                        rbk_db::set_user_role(&pool, &operator(), creds.user.id, role).await?;
                    println!("user_id={} email={} role={}", user.id, user.email, user.role.as_str());
                }
                UserCmd::List => {
                    let users = rbk_db::list_users(&pool).await?;
                    print_json(serde_json::to_value(users)?)?;
                }
            }
        }

        Commands::Room { cmd } => {
            let pool = connect().await?;
            match cmd {
                RoomCmd::List => {
                    let rooms = rbk_db::list_rooms(&pool).await?;
                    print_json(serde_json::to_value(rooms)?)?;
                }
                RoomCmd::Add {
                    name,
                    capacity,
                    location,
                    inactive,
                } => {
                    let room = rbk_db::create_room(
                        &pool,
                        &operator(),
                        &NewRoom {
                            name,
                            capacity,
                            location,
                            is_active: !inactive,
                        },
                    )
                    .await?;
                    println!("room_id={} name={} active={}", room.id, room.name, room.is_active);
                }
            }
        }

        Commands::Equipment { cmd } => {
            let pool = connect().await?;
            match cmd {
                EquipmentCmd::List => {
                    let items = rbk_db::list_equipment(&pool).await?;
                    print_json(serde_json::to_value(items)?)?;
                }
                EquipmentCmd::Add {
                    code,
                    name,
                    description,
                } => {
                    let eq = rbk_db::create_equipment(
                        &pool,
                        &operator(),
                        &NewEquipment {
                            code,
                            display_name: name,
                            description,
                        },
                    )
                    .await?;
                    println!("equipment_id={} code={}", eq.id, eq.code);
                }
            }
        }

        Commands::Reservation { cmd } => match cmd {
            ReservationCmd::List { room } => {
                let pool = connect().await?;
                match room {
                    Some(room) => {
                        let room_id = Uuid::parse_str(&room).context("invalid room uuid")?;
                        let rows = rbk_db::list_reservations_by_room(&pool, room_id).await?;
                        print_json(serde_json::to_value(rows)?)?;
                    }
                    None => {
                        let rows = rbk_db::list_reservations(&pool).await?;
                        print_json(serde_json::to_value(rows)?)?;
                    }
                }
            }
        },
    }

    Ok(())
}

fn init_tracing() {
    // stdout carries command output; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Pool sized by the same config layers the daemon reads.
async fn connect() -> Result<PgPool> {
    let loaded = rbk_config::load_from_env()?;
    let cfg = AppConfig::from_json(&loaded.config_json)?;
    rbk_db::connect_from_env(&cfg.db).await
}

/// Identity for operator commands. Shell access to the store is already
/// administrative, so the CLI acts as ADMIN without a stored account.
fn operator() -> Caller {
    Caller {
        user_id: Uuid::nil(),
        role: Role::Admin,
    }
}

fn parse_role(s: &str) -> std::result::Result<Role, String> {
    Role::parse(s).ok_or_else(|| format!("invalid role '{s}' (expected USER or ADMIN)"))
}

fn print_json(v: Value) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&v).context("serialize output failed")?
    );
    Ok(())
}
