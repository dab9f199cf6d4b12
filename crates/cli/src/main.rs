//! Fuel Station CLI - Database migrations and shift management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run the shift schema migrations
//! fs-cli migrate
//!
//! # Register a staff member
//! fs-cli employee create --id 12 -n "Ana Silva" -r supervisor
//!
//! # Inspect, open and close the station shift as the configured operator
//! fs-cli shift status
//! fs-cli shift begin --opening-cash 150.00 --staff 14 --staff 15
//! fs-cli shift end --closing-cash 980.50 -p cash=700 -p card=280.50:BATCH-19
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `employee create` - Create staff records
//! - `shift status|begin|end` - One-shot shift lifecycle operations

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use fuel_station_core::EmployeeId;

mod commands;

#[derive(Parser)]
#[command(name = "fs-cli")]
#[command(author, version, about = "Fuel station back office CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage staff records
    Employee {
        #[command(subcommand)]
        action: EmployeeAction,
    },
    /// Drive the shift lifecycle as the configured operator
    Shift {
        #[command(subcommand)]
        action: ShiftAction,
    },
}

#[derive(Subcommand)]
enum EmployeeAction {
    /// Create a staff record (no-op if the id already exists)
    Create {
        /// Employee id issued by the sign-in system
        #[arg(long)]
        id: EmployeeId,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Email address
        #[arg(short, long)]
        email: Option<String>,

        /// Role (`cashier`, `supervisor`, `manager`)
        #[arg(short, long, default_value = "cashier")]
        role: String,
    },
}

#[derive(Subcommand)]
enum ShiftAction {
    /// Show the open shift, if any
    Status {
        /// Employee to look up (defaults to `TILL_OPERATOR_ID`)
        #[arg(long)]
        employee: Option<EmployeeId>,
    },
    /// Open a shift
    Begin {
        /// Cash in the drawer at open
        #[arg(long)]
        opening_cash: Decimal,

        /// Additional staff on the shift (repeatable)
        #[arg(long = "staff")]
        staff: Vec<EmployeeId>,
    },
    /// Close the operator's open shift
    End {
        /// Cash in the drawer at close
        #[arg(long)]
        closing_cash: Decimal,

        /// Takings per payment method as `method=amount[:reference]` (repeatable)
        #[arg(short, long = "payment")]
        payments: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Employee { action } => match action {
            EmployeeAction::Create {
                id,
                name,
                email,
                role,
            } => {
                commands::employee::create(id, &name, email.as_deref(), &role).await?;
            }
        },
        Commands::Shift { action } => match action {
            ShiftAction::Status { employee } => commands::shift::status(employee).await?,
            ShiftAction::Begin {
                opening_cash,
                staff,
            } => commands::shift::begin(opening_cash, staff).await?,
            ShiftAction::End {
                closing_cash,
                payments,
            } => commands::shift::end(closing_cash, &payments).await?,
        },
    }
    Ok(())
}
