//! Plugin dependency resolution.
//!
//! Orders plugins so each one is registered after every plugin it depends
//! on. Depth-first traversal with explicit three-color marking:
//!
//! - **White**: not visited yet
//! - **Gray**: on the current DFS path (reaching one again means a cycle)
//! - **Black**: fully emitted
//!
//! Dependencies that are not part of the input are treated as satisfied.
//! Independent plugins keep their input order, so a fixed input always
//! produces the same output.

use std::collections::HashMap;

use mindloop_core::error::Error;
use mindloop_core::plugin::Plugin;
use tracing::debug;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    White,
    Gray,
    Black,
}

/// Return `plugins` reordered so dependencies come first.
///
/// Fails with [`Error::PluginLoad`] on a cycle and [`Error::DuplicatePlugin`]
/// when two plugins share a name; no partial order is returned.
pub fn resolve_plugin_order(plugins: Vec<Plugin>) -> Result<Vec<Plugin>, Error> {
    let order = resolve_indices(&plugins)?;

    let mut slots: Vec<Option<Plugin>> = plugins.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect())
}

fn resolve_indices(plugins: &[Plugin]) -> Result<Vec<usize>, Error> {
    let mut index_by_name: HashMap<&str, usize> = HashMap::with_capacity(plugins.len());
    for (i, plugin) in plugins.iter().enumerate() {
        if index_by_name.insert(plugin.name.as_str(), i).is_some() {
            return Err(Error::DuplicatePlugin(plugin.name.clone()));
        }
    }

    let mut marks = vec![Mark::White; plugins.len()];
    let mut order = Vec::with_capacity(plugins.len());

    for start in 0..plugins.len() {
        visit(start, plugins, &index_by_name, &mut marks, &mut order)?;
    }

    debug!(
        order = ?order.iter().map(|&i| plugins[i].name.as_str()).collect::<Vec<_>>(),
        "Resolved plugin order"
    );
    Ok(order)
}

fn visit(
    index: usize,
    plugins: &[Plugin],
    index_by_name: &HashMap<&str, usize>,
    marks: &mut [Mark],
    order: &mut Vec<usize>,
) -> Result<(), Error> {
    match marks[index] {
        Mark::Black => return Ok(()),
        Mark::Gray => {
            return Err(Error::PluginLoad {
                plugin: plugins[index].name.clone(),
            });
        }
        Mark::White => {}
    }

    marks[index] = Mark::Gray;
    for dependency in &plugins[index].dependencies {
        match index_by_name.get(dependency.as_str()) {
            Some(&dep) => visit(dep, plugins, index_by_name, marks, order)?,
            None => debug!(
                plugin = %plugins[index].name,
                dependency = %dependency,
                "Dependency not in plugin set; treating as satisfied"
            ),
        }
    }
    marks[index] = Mark::Black;
    order.push(index);
    Ok(())
}
