//! The resolution passes that turn a registry of declared models into a
//! frozen [`Schema`].
//!
//! The passes run in a fixed order: inheritance links, polymorphic parent
//! marking, target resolution, polymorphic expansion, name inference,
//! reciprocal injection. Enchantment then derives everything the passes
//! left implicit: default primary keys, the inheritance discriminator,
//! table names, foreign keys, join-table facts and the descendant graph.
//! Each pass guards against re-applying its own effects, so resolving a
//! registry that already carries partial declarations never duplicates
//! anything.

use super::{
    mapper, plural, Attribute, AttrType, Descendant, Model, ModelId, Name, Polymorphic, Registry,
    Relation, RelationKind, Schema, TargetRef,
};
use crate::driver::Dialect;
use crate::{Error, Result};

use indexmap::IndexMap;

pub(crate) fn resolve(registry: Registry, dialect: Dialect) -> Result<Schema> {
    let Registry {
        mut models,
        mut by_name,
        table_prefix,
        duplicates,
    } = registry;

    if let Some(name) = duplicates.first() {
        return Err(Error::configuration(format!(
            "`{name}` is defined more than once"
        )));
    }

    resolve_parents(&mut models, &by_name)?;
    mark_polymorphic_parents(&mut models);
    resolve_targets(&mut models, &by_name)?;
    expand_polymorphic(&mut models, &mut by_name);
    resolve_names(&mut models)?;
    inject_reciprocals(&mut models);

    force_primary_keys(&mut models);
    add_discriminators(&mut models);
    compute_tables(&mut models, &table_prefix, dialect);
    derive_foreign_keys(&mut models);
    derive_join_tables(&mut models, &table_prefix, dialect);
    check_resolved(&models)?;
    let descendants = compute_descendants(&models);

    Ok(Schema {
        models,
        by_name,
        descendants,
        table_prefix,
        dialect,
    })
}

/// Look a symbolic name up relative to `owner`: nested under the owner's
/// namespace first, walking outward, global last.
fn lookup(owner: &Name, target: &str, by_name: &IndexMap<String, ModelId>) -> Option<ModelId> {
    owner
        .lookup_candidates(target)
        .iter()
        .find_map(|candidate| by_name.get(candidate).copied())
}

fn resolve_parents(models: &mut [Model], by_name: &IndexMap<String, ModelId>) -> Result<()> {
    let mut links = vec![];
    for (i, model) in models.iter().enumerate() {
        if model.parent.is_some() {
            continue;
        }
        if let Some(parent) = &model.extends {
            let pid = lookup(&model.name, parent, by_name).ok_or_else(|| {
                Error::configuration(format!(
                    "`{}` extends unknown type `{parent}`",
                    model.name.full()
                ))
            })?;
            links.push((i, pid));
        }
    }
    for (i, pid) in links {
        models[i].parent = Some(pid);
        if !models[pid.0].sti_children.contains(&ModelId(i)) {
            models[pid.0].sti_children.push(ModelId(i));
        }
    }
    Ok(())
}

/// A model declaring a relation flagged polymorphic becomes a polymorphic
/// parent; the flagged relation is its placeholder, retargeted per owner
/// during expansion. An unnamed placeholder is named after its symbolic
/// target.
fn mark_polymorphic_parents(models: &mut [Model]) {
    for model in models.iter_mut() {
        let mut marker = None;
        for rel in &mut model.relations {
            if !rel.polymorphic {
                continue;
            }
            if rel.name.is_none() {
                if let TargetRef::Symbolic(target) = &rel.target {
                    rel.name = Some(Name::new(target).last_snake());
                }
            }
            marker = rel.name.clone();
        }
        if let Some(relation) = marker {
            if !matches!(model.polymorphic, Polymorphic::Child) {
                model.polymorphic = Polymorphic::Parent { relation };
            }
        }
    }
}

fn resolve_targets(models: &mut [Model], by_name: &IndexMap<String, ModelId>) -> Result<()> {
    for model in models.iter_mut() {
        let owner_name = model.name.clone();
        let is_parent = model.is_polymorphic_parent();
        for rel in &mut model.relations {
            // A parent's placeholder stays symbolic; each expansion clone
            // retargets its own copy.
            if is_parent && rel.polymorphic {
                continue;
            }
            if let TargetRef::Symbolic(target) = &rel.target {
                match lookup(&owner_name, target, by_name) {
                    Some(id) => rel.target = TargetRef::Resolved(id),
                    None => {
                        return Err(Error::configuration(format!(
                            "cannot resolve relation target `{target}` declared by `{}`",
                            owner_name.full()
                        )))
                    }
                }
            }
            if let Some(TargetRef::Symbolic(through)) = &rel.through {
                match lookup(&owner_name, through, by_name) {
                    Some(id) => rel.through = Some(TargetRef::Resolved(id)),
                    None => {
                        return Err(Error::configuration(format!(
                            "cannot resolve join type `{through}` declared by `{}`",
                            owner_name.full()
                        )))
                    }
                }
            }
        }
    }
    Ok(())
}

/// Every relation aimed at a polymorphic parent is redirected at a child
/// model `Owner::Parent`, synthesized once per owner (presence check by
/// name). The child is a clone of the parent with its placeholder relation
/// aimed back at the owner. Synthesized children are scanned too, so a
/// cloned relation aimed at another parent expands transitively.
fn expand_polymorphic(models: &mut Vec<Model>, by_name: &mut IndexMap<String, ModelId>) {
    let mut i = 0;
    while i < models.len() {
        if models[i].is_polymorphic_parent() {
            i += 1;
            continue;
        }
        for j in 0..models[i].relations.len() {
            // A child's placeholder already points at its owner.
            if models[i].relations[j].polymorphic {
                continue;
            }
            let Some(tid) = models[i].relations[j].target.resolved() else {
                continue;
            };
            if !models[tid.0].is_polymorphic_parent() {
                continue;
            }

            let owner_id = ModelId(i);
            let child_name = models[i].name.nested(models[tid.0].name.last());
            let child_id = match by_name.get(&child_name.full()) {
                Some(id) => *id,
                None => {
                    let child_id = ModelId(models.len());
                    let mut child = models[tid.0].clone();
                    child.id = child_id;
                    child.name = child_name.clone();
                    child.polymorphic = Polymorphic::Child;
                    child.table_override = None;
                    for rel in &mut child.relations {
                        rel.owner = child_id;
                        if rel.polymorphic {
                            rel.target = TargetRef::Resolved(owner_id);
                        }
                    }
                    by_name.insert(child_name.full(), child_id);
                    models.push(child);
                    child_id
                }
            };
            models[i].relations[j].target = TargetRef::Resolved(child_id);
        }
        i += 1;
    }
}

/// Unnamed relations get a name inferred from the target type, pluralized
/// for collections. Two relations with the same resulting name on one
/// model is a declaration error.
fn resolve_names(models: &mut [Model]) -> Result<()> {
    let last_snakes: Vec<String> = models.iter().map(|m| m.name.last_snake()).collect();

    for model in models.iter_mut() {
        for rel in &mut model.relations {
            if rel.name.is_some() {
                continue;
            }
            let Some(tid) = rel.target.resolved() else {
                continue;
            };
            let base = &last_snakes[tid.0];
            rel.name = Some(if rel.collection {
                plural(base)
            } else {
                base.clone()
            });
        }

        for (a, rel) in model.relations.iter().enumerate() {
            for other in &model.relations[..a] {
                if rel.name.is_some() && rel.name == other.name {
                    return Err(Error::configuration(format!(
                        "`{}` declares two relations named `{}`; name one of them explicitly",
                        model.name.full(),
                        rel.name.as_deref().unwrap_or(""),
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Every one-to-many declaration implies a reference on the target side;
/// targets that do not declare one get it injected, named after the owner.
fn inject_reciprocals(models: &mut Vec<Model>) {
    let mut injections: Vec<(ModelId, Relation)> = vec![];

    for model in models.iter() {
        if model.is_polymorphic_parent() {
            continue;
        }
        for rel in &model.relations {
            if rel.kind != RelationKind::HasMany {
                continue;
            }
            let Some(tid) = rel.target.resolved() else {
                continue;
            };
            let back = Some(model.id);
            let declared = models[tid.0]
                .relations
                .iter()
                .any(|r| r.kind == RelationKind::BelongsTo && r.target.resolved() == back);
            let pending = injections
                .iter()
                .any(|(t, r)| *t == tid && r.target.resolved() == back);
            if declared || pending {
                continue;
            }
            injections.push((
                tid,
                Relation {
                    kind: RelationKind::BelongsTo,
                    owner: tid,
                    target: TargetRef::Resolved(model.id),
                    name: Some(model.name.last_snake()),
                    foreign_key: None,
                    collection: false,
                    polymorphic: false,
                    through: None,
                    table: None,
                    join: None,
                },
            ));
        }
    }

    for (tid, rel) in injections {
        models[tid.0].relations.push(rel);
    }
}

fn force_primary_keys(models: &mut [Model]) {
    for model in models.iter_mut() {
        // Inheritance children share the root's key.
        if model.parent.is_some() {
            continue;
        }
        if model.attributes.iter().any(|a| a.primary_key) {
            continue;
        }
        model.attributes.insert(0, Attribute::auto_id("id"));
    }
}

fn add_discriminators(models: &mut [Model]) {
    for model in models.iter_mut() {
        if !model.is_sti_root() || model.attribute("model_type").is_some() {
            continue;
        }
        let pos = model.attributes.len().min(1);
        model
            .attributes
            .insert(pos, Attribute::new("model_type", AttrType::Text).index());
    }
}

fn sti_root(models: &[Model], id: ModelId) -> ModelId {
    let mut cur = id;
    while let Some(parent) = models[cur.0].parent {
        cur = parent;
    }
    cur
}

fn pk_column(models: &[Model], id: ModelId) -> String {
    let root = sti_root(models, id);
    models[root.0]
        .primary_key()
        .map(|a| a.column_name().to_string())
        .unwrap_or_else(|| "id".to_string())
}

fn pk_type(models: &[Model], id: ModelId) -> AttrType {
    let root = sti_root(models, id);
    models[root.0]
        .primary_key()
        .map(|a| a.ty)
        .unwrap_or(AttrType::BigInt)
}

fn effective_attribute<'a>(models: &'a [Model], id: ModelId, name: &str) -> Option<&'a Attribute> {
    let mut cur = Some(id);
    while let Some(c) = cur {
        if let Some(attr) = models[c.0].attribute(name) {
            return Some(attr);
        }
        cur = models[c.0].parent;
    }
    None
}

fn compute_tables(models: &mut [Model], prefix: &str, dialect: Dialect) {
    for i in 0..models.len() {
        if models[i].parent.is_some() {
            continue;
        }
        models[i].table = if models[i].is_polymorphic_parent() {
            String::new()
        } else {
            let name = match &models[i].table_override {
                Some(table) => table.clone(),
                None => mapper::tableize(prefix, &models[i].name),
            };
            dialect.fit_identifier(name)
        };
    }
    for i in 0..models.len() {
        if models[i].parent.is_some() {
            let root = sti_root(models, ModelId(i));
            models[i].table = models[root.0].table.clone();
        }
    }
}

fn derive_foreign_keys(models: &mut [Model]) {
    // References first: they settle the columns one-to-many relations key
    // through.
    for i in 0..models.len() {
        if models[i].is_polymorphic_parent() {
            continue;
        }
        for j in 0..models[i].relations.len() {
            let rel = &models[i].relations[j];
            if !rel.is_reference() {
                continue;
            }
            let Some(tid) = rel.target.resolved() else {
                continue;
            };
            let fk = match &rel.foreign_key {
                Some(fk) => fk.clone(),
                None => format!("{}_{}", rel.name(), pk_column(models, tid)),
            };
            let ty = pk_type(models, tid);
            models[i].relations[j].foreign_key = Some(fk.clone());
            if effective_attribute(models, ModelId(i), &fk).is_none() {
                models[i].attributes.push(Attribute::new(&fk, ty).index());
            }
        }
    }

    for i in 0..models.len() {
        if models[i].is_polymorphic_parent() {
            continue;
        }
        for j in 0..models[i].relations.len() {
            let rel = &models[i].relations[j];
            if rel.kind != RelationKind::HasMany {
                continue;
            }
            let Some(tid) = rel.target.resolved() else {
                continue;
            };
            let fk = match &rel.foreign_key {
                Some(fk) => fk.clone(),
                None => {
                    let back = Some(ModelId(i));
                    let reciprocal = models[tid.0]
                        .relations
                        .iter()
                        .find(|r| r.kind == RelationKind::BelongsTo && r.target.resolved() == back)
                        .and_then(|r| r.foreign_key.clone());
                    match reciprocal {
                        Some(fk) => fk,
                        None => {
                            let root = sti_root(models, ModelId(i));
                            format!(
                                "{}_{}",
                                models[root.0].name.last_snake(),
                                pk_column(models, ModelId(i))
                            )
                        }
                    }
                }
            };
            models[i].relations[j].foreign_key = Some(fk);
        }
    }
}

fn derive_join_tables(models: &mut [Model], prefix: &str, dialect: Dialect) {
    for i in 0..models.len() {
        if models[i].is_polymorphic_parent() {
            continue;
        }
        for j in 0..models[i].relations.len() {
            let rel = models[i].relations[j].clone();
            if rel.kind != RelationKind::JoinsMany || rel.join.is_some() {
                continue;
            }
            let Some(tid) = rel.target.resolved() else {
                continue;
            };

            let owner_root = sti_root(models, ModelId(i));
            let target_root = sti_root(models, tid);

            // The postfix disambiguates a relation renamed away from the
            // inflected default, so two differently-named relations over
            // the same pair get distinct join tables.
            let default_name = plural(&models[tid.0].name.last_snake());
            let postfix = match rel.name() {
                name if name == default_name => String::new(),
                name => format!("_{name}"),
            };

            // A user-defined join type realizes the join in its own table.
            let table_override = match &rel.through {
                Some(through) => Some(models[through.expect_resolved().0].table.clone()),
                None => rel.table.clone(),
            };

            let info = mapper::join_table_info(
                prefix,
                &models[owner_root.0].name.clone(),
                &models[owner_root.0].table.clone(),
                &pk_column(models, ModelId(i)),
                &models[target_root.0].name.clone(),
                &models[target_root.0].table.clone(),
                &pk_column(models, tid),
                &postfix,
                table_override.as_deref(),
                dialect,
            );
            models[i].relations[j].join = Some(info);
        }
    }
}

fn check_resolved(models: &[Model]) -> Result<()> {
    for model in models {
        if model.is_polymorphic_parent() {
            continue;
        }
        for rel in &model.relations {
            if rel.target.resolved().is_none() {
                return Err(Error::configuration(format!(
                    "relation `{}` on `{}` was never resolved",
                    rel.name(),
                    model.name.full()
                )));
            }
        }
    }
    Ok(())
}

/// The cascade graph: for each model, what has to go when one of its rows
/// goes. Owning references put the referencing model in the target's
/// descendants; join tables put their rows in the owner's. Non-owning
/// references register nothing.
fn compute_descendants(models: &[Model]) -> Vec<Vec<Descendant>> {
    let mut descendants = vec![Vec::new(); models.len()];

    for model in models {
        if model.is_polymorphic_parent() {
            continue;
        }
        for rel in &model.relations {
            match rel.kind {
                RelationKind::BelongsTo => {
                    if let (Some(tid), Some(fk)) = (rel.target.resolved(), &rel.foreign_key) {
                        descendants[tid.0].push(Descendant::Owned {
                            model: model.id,
                            foreign_key: fk.clone(),
                        });
                    }
                }
                RelationKind::JoinsMany => {
                    if let Some(info) = &rel.join {
                        descendants[model.id.0].push(Descendant::Join {
                            table: info.table.clone(),
                            owner_key: info.owner_key.clone(),
                        });
                    }
                }
                RelationKind::RefersTo | RelationKind::HasMany => {}
            }
        }
    }

    descendants
}
