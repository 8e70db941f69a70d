use serde_json::json;

use st_methods::MethodRegistry;

/// Print the registered methods.
pub fn list(json_output: bool) -> anyhow::Result<()> {
    let registry = MethodRegistry::builtin();
    let names = registry.names();

    if json_output {
        let mut rows = Vec::with_capacity(names.len());
        for name in &names {
            let spec = registry.get(name)?;
            rows.push(json!({
                "name": spec.name,
                "family": spec.family,
                "shape": spec.shape,
                "accepts": spec.accepts.iter().map(|k| k.to_string()).collect::<Vec<_>>(),
            }));
        }
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{:<28} {:<12} accepts", "method", "family");
    for name in &names {
        let spec = registry.get(name)?;
        let accepts: Vec<String> = spec.accepts.iter().map(|k| k.to_string()).collect();
        println!("{:<28} {:<12} {}", spec.name, spec.family.as_str(), accepts.join(", "));
    }
    Ok(())
}
