//! Object listing, upload, download and deletion.

use anyhow::{Context, Result};
use atlink::error::codes;
use atlink::{Category, Element, Request, Response};
use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fs;
use std::path::Path;

use super::{Failed, Session};
use crate::use_fancy_output;

/// List one category, or every category in listing order.
pub(crate) fn list(session: &mut Session, category: Option<Category>) -> Result<()> {
    let categories = match category {
        Some(category) => vec![category],
        None => Category::ALL.to_vec(),
    };

    let mut rows: Vec<(Category, Element)> = Vec::new();
    for category in categories {
        for element in elements(session, category)? {
            rows.push((category, element));
        }
    }

    if session.json() {
        let all = rows
            .into_iter()
            .map(|(_, element)| element)
            .collect();
        return session.print_json(Response::Elements(all));
    }

    if rows.is_empty() {
        if session.chatty() {
            eprintln!("{} No objects stored", style("ℹ").blue());
        }
        return Ok(());
    }

    for (category, element) in &rows {
        println!(
            "{:<22} {:<10} {:<5} {}",
            element.id(),
            category,
            element.kind(),
            element.file_name()
        );
    }
    Ok(())
}

fn elements(session: &mut Session, category: Category) -> Result<Vec<Element>> {
    match session.call(Request::List(category))? {
        Response::Elements(elements) => Ok(elements),
        _ => Ok(Vec::new()),
    }
}

/// Upload one file, with a progress bar on interactive terminals.
pub(crate) fn upload(session: &mut Session, file: &Path) -> Result<()> {
    let pb = if !session.chatty() || !use_fancy_output() {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
                )?
                .progress_chars("#>-"),
        );
        pb.set_draw_target(ProgressDrawTarget::stderr());
        pb
    };
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    pb.set_message(name.clone());

    let result = session.call_with_progress(Request::Upload(file.to_path_buf()), &mut |sent, total| {
        pb.set_length(total as u64);
        pb.set_position(sent as u64);
    });
    match result {
        Ok(_) => {
            pb.finish_and_clear();
            session.done(&format!("Uploaded {name}"))
        },
        Err(e) => {
            pb.abandon();
            Err(e)
        },
    }
}

/// Find the object by id and save it under `dir`.
pub(crate) fn download(session: &mut Session, id: &str, dir: &Path) -> Result<()> {
    let mut found = None;
    for category in Category::ALL {
        if let Some(element) = elements(session, category)?
            .into_iter()
            .find(|e| e.id() == id)
        {
            found = Some(element);
            break;
        }
    }
    let Some(element) = found else {
        let mut failed = Failed::new(codes::REJECTED, "No such object on the phone");
        failed.detail = Some(id.to_string());
        return Err(failed.into());
    };

    fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create {}", dir.display()))
        .map_err(|e| Failed::new(codes::FILE_IO, format!("{e:#}")))?;

    let response = session.call(Request::Download {
        element,
        dir: dir.to_path_buf(),
    })?;

    if session.json() {
        return session.print_json(response);
    }
    if let Response::Saved(path) = response {
        println!("{}", path.display());
    }
    Ok(())
}

/// Delete an object by id.
pub(crate) fn delete(session: &mut Session, id: &str) -> Result<()> {
    session.call(Request::Delete(id.to_string()))?;
    session.done(&format!("Deleted {id}"))
}
