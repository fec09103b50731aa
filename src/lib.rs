/*!
# Workout Log

A small single-user web application for logging gym sets, built in Rust.

## Overview

Sets (exercise, reps, weight, set count, notes) are entered throughout the day
from a browser. At the end of the day the user finalizes the day, which writes
an XLSX workbook to an export directory and mirrors it to a second location.
A separate job exports the trailing seven days into one weekly workbook.

## Architecture

### Web Layer (feature `web`)
- **Technologies**: axum, Handlebars templates, argon2 password hashes
- **Key Components**:
  - Login / session handling with a server-side session table
  - Day view with the entry form and today's sets
  - History view over a date range
  - Admin page for the exercise catalogue and password changes

### Core Layer
- **store**: SQLite persistence through sqlx (users, exercises, sets, finalized markers)
- **finalize**: decides whether a day has already been exported
- **export**: daily and weekly workbooks written to primary and mirror directories
- **wipe**: clears a day's sets unless the day is finalized
- **downloader**: XLSX encoding

## Finalization

A day counts as finalized when its daily workbook exists in either export
directory, or when a finalized marker row was recorded for it. Every probe
fails open: an unreadable directory or a failed query means "not finalized".
A finalized day can never be wiped.

## Binaries

- `website` - the web server
- `weekly-export [--end YYYY-MM-DD]` - writes the weekly workbook ending on the given day (default today)

## HTTP Endpoints

- `/login`, `/logout` - authentication
- `/` - today's sets and the entry form
- `/submit` - log one set
- `/finish` - export today and download the workbook
- `/history` - sets between two dates
- `/admin` - catalogue and password management
- `/wipe_today`, `/reset_day` - wipe a day
*/

pub mod config;
pub mod downloader;
pub mod error;
pub mod export;
pub mod finalize;
pub mod logging;
pub mod store;
pub mod wipe;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod login;
#[cfg(feature = "web")]
pub mod pages;

pub use config::Config;
pub use error::{AppError, ConfigError, ExportError, StoreError};
pub use store::Store;
