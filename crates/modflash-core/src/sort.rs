//! Dependency ordering of modules

use crate::module::FirmwareModule;

/// Orders modules so that every module comes after the modules it depends on
pub trait DependencySorter {
    /// Return the modules in a dependency-respecting order
    fn sort(&self, modules: Vec<FirmwareModule>) -> Vec<FirmwareModule>;
}

/// Stable topological sort over the modules' dependency references
///
/// A dependency only orders modules when a module in the same set satisfies
/// it; references to anything else are already satisfied by the device.
/// Among modules that are ready at the same time, input order is kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopologicalSorter;

impl DependencySorter for TopologicalSorter {
    fn sort(&self, modules: Vec<FirmwareModule>) -> Vec<FirmwareModule> {
        let count = modules.len();

        // prerequisites[i] = indices of modules that must precede module i
        let prerequisites: Vec<Vec<usize>> = modules
            .iter()
            .enumerate()
            .map(|(i, module)| {
                let mut deps: Vec<usize> = module
                    .dependencies
                    .iter()
                    .flat_map(|dep| {
                        modules
                            .iter()
                            .enumerate()
                            .filter(move |(j, other)| *j != i && other.satisfies(dep))
                            .map(|(j, _)| j)
                    })
                    .collect();
                deps.sort_unstable();
                deps.dedup();
                deps
            })
            .collect();

        let mut placed = vec![false; count];
        let mut order = Vec::with_capacity(count);

        while order.len() < count {
            let ready = (0..count)
                .find(|&i| !placed[i] && prerequisites[i].iter().all(|&j| placed[j]));

            match ready {
                Some(i) => {
                    placed[i] = true;
                    order.push(i);
                }
                None => {
                    log::warn!("Dependency cycle among modules, keeping input order for the rest");
                    order.extend((0..count).filter(|&i| !placed[i]));
                    break;
                }
            }
        }

        let mut slots: Vec<Option<FirmwareModule>> = modules.into_iter().map(Some).collect();
        order
            .into_iter()
            .filter_map(|i| slots[i].take())
            .collect()
    }
}
