//! Hot swap of live component instances

use tracing::{debug, info};

use super::host::{Host, HostError, Instance, IDENTITY_ATTRIBUTES};
use super::linker::Linker;

/// Replace every live instance created by `module_name` with a fresh one
///
/// An instance is swapped when its component class is still exported by the
/// module. The replacement keeps the instance id, props, nucleus children and
/// identity attributes; its markup is rendered by the new class. Returns the
/// number of instances replaced.
pub fn hot_swap(linker: &Linker, host: &mut dyn Host, module_name: &str) -> Result<usize, HostError> {
    let Some(exports) = linker.registry().get_exact(module_name) else {
        debug!(module = module_name, "nothing published, skipping hot swap");
        return Ok(0);
    };

    let mut swapped = 0;
    for instance in host.instances() {
        if instance.factory != module_name {
            continue;
        }
        let Some(class) = exports.component(&instance.component) else {
            debug!(module = module_name, component = %instance.component, "component no longer exported");
            continue;
        };

        let attributes = instance
            .attributes
            .iter()
            .filter(|(key, _)| IDENTITY_ATTRIBUTES.contains(&key.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let replacement = Instance {
            id: instance.id.clone(),
            factory: class.factory.clone().unwrap_or_else(|| module_name.to_string()),
            component: instance.component.clone(),
            markup: class.render(&instance.props),
            props: instance.props,
            nucleus_children: instance.nucleus_children,
            attributes,
        };
        host.replace_instance(&instance.id, replacement)?;
        swapped += 1;
    }

    info!(module = module_name, instances = swapped, "hot swapped");
    Ok(swapped)
}
