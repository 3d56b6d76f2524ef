//! Compilation of filter trees into SQL joins over aspect tables.
//!
//! The compiler asks the storage manager for every table and column name
//! and owns nothing but the join/translation logic: necessary aspects gate
//! inclusion (inner join), optional and filter-only aspects attach when
//! present (left join), and the filter tree becomes one parameterized
//! boolean expression. Literals are always bound, never concatenated.

use crate::aspect::{AspectId, AspectInstance, AspectMetadata, AttributeSpec, AttributeValue, Cardinality, ProviderResourceAspect};
use crate::error::Result;
use crate::library::{MediaItem, MediaItemId};
use crate::mia::AspectStorageManager;
use crate::query::filter::{AttributeRef, Filter};
use anyhow::anyhow;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::{BTreeSet, HashSet};

const ITEM_ALIAS: &str = "i";

/// What a caller wants back: items carrying all `necessary` aspects,
/// `optional` aspects attached when present, restricted by `filter`.
#[derive(Debug, Clone, Default)]
pub struct MediaQuery {
    pub necessary: Vec<AspectId>,
    pub optional: Vec<AspectId>,
    pub filter: Option<Filter>,
}

impl MediaQuery {
    pub fn new(necessary: Vec<AspectId>, optional: Vec<AspectId>, filter: Option<Filter>) -> Self {
        MediaQuery {
            necessary,
            optional,
            filter,
        }
    }
}

struct AttachSlot {
    metadata: AspectMetadata,
    /// Select-list index of the aspect table's media_item_id column; NULL
    /// there means the left join found no row, so the aspect is simply not
    /// attached (never attached-with-null).
    marker_index: usize,
    single_columns: Vec<(usize, AttributeSpec)>,
}

pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
    attach_plan: Vec<AttachSlot>,
    /// Provider-resource is force-joined so every item stays locatable; when
    /// the caller did not ask for it, it is stripped from the result again.
    strip_provider: bool,
}

pub struct QueryCompiler<'a> {
    manager: &'a AspectStorageManager,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(manager: &'a AspectStorageManager) -> Self {
        QueryCompiler { manager }
    }

    pub fn compile(&self, query: &MediaQuery) -> Result<CompiledQuery> {
        let requested: HashSet<AspectId> = query
            .necessary
            .iter()
            .chain(query.optional.iter())
            .copied()
            .collect();

        // Provider-resource always joins as necessary; every returned item
        // must be locatable.
        let mut necessary: Vec<AspectId> = vec![ProviderResourceAspect::ASPECT_ID];
        for aspect in &query.necessary {
            if !necessary.contains(aspect) {
                necessary.push(*aspect);
            }
        }
        let mut optional: Vec<AspectId> = Vec::new();
        for aspect in &query.optional {
            if !necessary.contains(aspect) && !optional.contains(aspect) {
                optional.push(*aspect);
            }
        }
        let filter_only: BTreeSet<AspectId> = query
            .filter
            .as_ref()
            .map(|f| f.referenced_aspects())
            .unwrap_or_default()
            .into_iter()
            .filter(|a| !necessary.contains(a) && !optional.contains(a))
            .collect();

        let mut select = vec![format!("{ITEM_ALIAS}.id")];
        let mut joins = Vec::new();
        let mut attach_plan = Vec::new();

        for (aspect, inner) in necessary
            .iter()
            .map(|a| (*a, true))
            .chain(optional.iter().map(|a| (*a, false)))
        {
            let metadata = self.manager.metadata(aspect)?;
            let table = AspectStorageManager::table_name(&metadata);
            joins.push(format!(
                "{} JOIN {table} ON {table}.media_item_id = {ITEM_ALIAS}.id",
                if inner { "INNER" } else { "LEFT" }
            ));

            let marker_index = select.len();
            select.push(format!("{table}.media_item_id"));
            let mut single_columns = Vec::new();
            for spec in metadata.single_value_attributes() {
                single_columns.push((select.len(), spec.clone()));
                select.push(format!("{table}.{}", AspectStorageManager::column_name(spec)));
            }
            attach_plan.push(AttachSlot {
                metadata,
                marker_index,
                single_columns,
            });
        }

        for aspect in filter_only {
            let metadata = self.manager.metadata(aspect)?;
            let table = AspectStorageManager::table_name(&metadata);
            joins.push(format!(
                "LEFT JOIN {table} ON {table}.media_item_id = {ITEM_ALIAS}.id"
            ));
        }

        let mut params: Vec<SqlValue> = Vec::new();
        let condition = match &query.filter {
            Some(filter) => Some(self.filter_sql(filter, &mut params)?),
            None => None,
        };

        let mut sql = format!(
            "SELECT {} FROM {} {ITEM_ALIAS} {}",
            select.join(", "),
            crate::sqlite_schema::CoreTables::MEDIA_ITEMS,
            joins.join(" ")
        );
        if let Some(condition) = condition {
            sql.push_str(" WHERE ");
            sql.push_str(&condition);
        }

        Ok(CompiledQuery {
            sql,
            params,
            attach_plan,
            strip_provider: !requested.contains(&ProviderResourceAspect::ASPECT_ID),
        })
    }

    /// Compile and run, materializing each row into a `MediaItem` with its
    /// attached aspect instances.
    pub fn execute(&self, conn: &Connection, query: &MediaQuery) -> Result<Vec<MediaItem>> {
        let compiled = self.compile(query)?;
        let mut stmt = conn.prepare(&compiled.sql)?;
        let row_data: Vec<(String, Vec<SqlValue>)> = stmt
            .query_map(params_from_iter(compiled.params.iter().cloned()), |row| {
                let id: String = row.get(0)?;
                let mut values = Vec::new();
                for slot in &compiled.attach_plan {
                    values.push(row.get::<_, SqlValue>(slot.marker_index)?);
                    for (index, _) in &slot.single_columns {
                        values.push(row.get::<_, SqlValue>(*index)?);
                    }
                }
                Ok((id, values))
            })?
            .collect::<std::result::Result<_, _>>()?;

        let mut items = Vec::with_capacity(row_data.len());
        for (id, values) in row_data {
            let item_id = MediaItemId::parse(&id)?;
            let mut item = MediaItem::new(item_id);
            let mut cursor = values.into_iter();
            for slot in &compiled.attach_plan {
                let marker = cursor.next().expect("marker column present");
                let singles: Vec<SqlValue> =
                    (&mut cursor).take(slot.single_columns.len()).collect();
                if matches!(marker, SqlValue::Null) {
                    continue;
                }
                if compiled.strip_provider
                    && slot.metadata.id == ProviderResourceAspect::ASPECT_ID
                {
                    continue;
                }
                let mut instance = AspectInstance::new(slot.metadata.id);
                for ((_, spec), value) in slot.single_columns.iter().zip(singles) {
                    if let Some(decoded) =
                        AttributeValue::from_sql_value(value, &spec.value_type)?
                    {
                        instance.insert(spec.name.clone(), decoded);
                    }
                }
                self.load_multi_values(conn, item_id, &slot.metadata, &mut instance)?;
                item.attach(instance);
            }
            items.push(item);
        }
        Ok(items)
    }

    fn load_multi_values(
        &self,
        conn: &Connection,
        item_id: MediaItemId,
        metadata: &AspectMetadata,
        instance: &mut AspectInstance,
    ) -> Result<()> {
        for spec in metadata.multi_value_attributes() {
            let child = AspectStorageManager::child_table_name(metadata, spec);
            let mut stmt = conn.prepare(&format!(
                "SELECT value FROM {child} WHERE media_item_id = ?1 ORDER BY rowid"
            ))?;
            let values: Vec<AttributeValue> = stmt
                .query_map(params![item_id.to_string()], |row| {
                    row.get::<_, SqlValue>(0)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?
                .into_iter()
                .filter_map(|v| AttributeValue::from_sql_value(v, &spec.value_type).transpose())
                .collect::<std::result::Result<_, _>>()?;
            if !values.is_empty() {
                instance.insert_multi(spec.name.clone(), values);
            }
        }
        Ok(())
    }

    /// Distribution of one single-value attribute's values over all items
    /// matching `filter`: (value, distinct item count) pairs. Feeds the
    /// grouping functions.
    pub fn execute_value_distribution(
        &self,
        conn: &Connection,
        attr: &AttributeRef,
        filter: Option<&Filter>,
    ) -> Result<Vec<(Option<AttributeValue>, i64)>> {
        let metadata = self.manager.metadata(attr.aspect)?;
        let spec = metadata
            .attribute(&attr.attribute)
            .ok_or_else(|| crate::error::LibraryError::UnknownAttribute {
                aspect: attr.aspect,
                attribute: attr.attribute.clone(),
            })?
            .clone();
        if spec.cardinality != Cardinality::Single {
            return Err(anyhow!(
                "value distribution requires a single-value attribute, '{}' is multi-valued",
                attr.attribute
            )
            .into());
        }

        let table = AspectStorageManager::table_name(&metadata);
        let column = AspectStorageManager::column_name(&spec);
        let mut joins = vec![format!(
            "INNER JOIN {table} ON {table}.media_item_id = {ITEM_ALIAS}.id"
        )];
        for aspect in filter
            .map(|f| f.referenced_aspects())
            .unwrap_or_default()
            .into_iter()
            .filter(|a| *a != attr.aspect)
        {
            let other = self.manager.metadata(aspect)?;
            let other_table = AspectStorageManager::table_name(&other);
            joins.push(format!(
                "LEFT JOIN {other_table} ON {other_table}.media_item_id = {ITEM_ALIAS}.id"
            ));
        }

        let mut params: Vec<SqlValue> = Vec::new();
        let condition = match filter {
            Some(filter) => format!(" WHERE {}", self.filter_sql(filter, &mut params)?),
            None => String::new(),
        };
        let sql = format!(
            "SELECT {table}.{column}, COUNT(DISTINCT {ITEM_ALIAS}.id) \
             FROM {} {ITEM_ALIAS} {}{} GROUP BY {table}.{column}",
            crate::sqlite_schema::CoreTables::MEDIA_ITEMS,
            joins.join(" "),
            condition
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows: Vec<(SqlValue, i64)> = stmt
            .query_map(params_from_iter(params), |row| {
                Ok((row.get::<_, SqlValue>(0)?, row.get(1)?))
            })?
            .collect::<std::result::Result<_, _>>()?;

        let mut distribution = Vec::with_capacity(rows.len());
        for (value, count) in rows {
            distribution.push((
                AttributeValue::from_sql_value(value, &spec.value_type)?,
                count,
            ));
        }
        Ok(distribution)
    }

    /// Build the OR-of-LIKEs filter for a free-text substring search. When
    /// `aspects` is empty every managed aspect is eligible. Attributes must
    /// be textual, not shorter-bounded than the term, and not large text
    /// unless `include_large_text`. An empty term matches nothing.
    pub fn text_search_filter(
        &self,
        term: &str,
        aspects: &[AspectId],
        include_large_text: bool,
    ) -> Result<Filter> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Filter::AlwaysFalse);
        }
        let term_len = term.chars().count();

        let eligible_metadata: Vec<AspectMetadata> = if aspects.is_empty() {
            self.manager.managed_aspects()
        } else {
            aspects
                .iter()
                .map(|a| self.manager.metadata(*a))
                .collect::<Result<_>>()?
        };

        let mut likes = Vec::new();
        for metadata in &eligible_metadata {
            for spec in &metadata.attributes {
                let eligible = match spec.value_type {
                    crate::aspect::AttributeType::Text { max_len, large } => {
                        max_len.map_or(true, |l| l >= term_len)
                            && (!large || include_large_text)
                    }
                    _ => false,
                };
                if eligible {
                    likes.push(Filter::contains(
                        AttributeRef::new(metadata.id, spec.name.clone()),
                        term,
                    ));
                }
            }
        }
        if likes.is_empty() {
            return Ok(Filter::AlwaysFalse);
        }
        Ok(Filter::Or(likes))
    }

    // =========================================================================
    // Filter translation
    // =========================================================================

    fn filter_sql(&self, filter: &Filter, params: &mut Vec<SqlValue>) -> Result<String> {
        Ok(match filter {
            Filter::Compare { attr, op, value } => {
                let (metadata, spec) = self.resolve(attr)?;
                match spec.cardinality {
                    Cardinality::Single => {
                        let table = AspectStorageManager::table_name(&metadata);
                        let column = AspectStorageManager::column_name(&spec);
                        params.push(value.to_sql_value());
                        format!("{table}.{column} {} ?", op.as_sql())
                    }
                    Cardinality::Multi => {
                        let child = AspectStorageManager::child_table_name(&metadata, &spec);
                        params.push(value.to_sql_value());
                        format!(
                            "EXISTS (SELECT 1 FROM {child} WHERE {child}.media_item_id = \
                             {ITEM_ALIAS}.id AND {child}.value {} ?)",
                            op.as_sql()
                        )
                    }
                }
            }
            Filter::Like {
                attr,
                pattern,
                escape,
                case_sensitive,
            } => {
                let (metadata, spec) = self.resolve(attr)?;
                let target = match spec.cardinality {
                    Cardinality::Single => {
                        let table = AspectStorageManager::table_name(&metadata);
                        let column = AspectStorageManager::column_name(&spec);
                        format!("{table}.{column}")
                    }
                    Cardinality::Multi => {
                        let child = AspectStorageManager::child_table_name(&metadata, &spec);
                        params.push(SqlValue::Text(pattern.clone()));
                        params.push(SqlValue::Text(escape.to_string()));
                        let comparison = if *case_sensitive {
                            format!("{child}.value LIKE ? ESCAPE ?")
                        } else {
                            format!("LOWER({child}.value) LIKE LOWER(?) ESCAPE ?")
                        };
                        return Ok(format!(
                            "EXISTS (SELECT 1 FROM {child} WHERE {child}.media_item_id = \
                             {ITEM_ALIAS}.id AND {comparison})"
                        ));
                    }
                };
                params.push(SqlValue::Text(pattern.clone()));
                params.push(SqlValue::Text(escape.to_string()));
                if *case_sensitive {
                    format!("{target} LIKE ? ESCAPE ?")
                } else {
                    format!("LOWER({target}) LIKE LOWER(?) ESCAPE ?")
                }
            }
            Filter::And(children) => {
                if children.is_empty() {
                    "1".to_string()
                } else {
                    let parts = children
                        .iter()
                        .map(|c| self.filter_sql(c, params))
                        .collect::<Result<Vec<_>>>()?;
                    format!("({})", parts.join(" AND "))
                }
            }
            Filter::Or(children) => {
                if children.is_empty() {
                    "0".to_string()
                } else {
                    let parts = children
                        .iter()
                        .map(|c| self.filter_sql(c, params))
                        .collect::<Result<Vec<_>>>()?;
                    format!("({})", parts.join(" OR "))
                }
            }
            Filter::Not(child) => format!("NOT ({})", self.filter_sql(child, params)?),
            Filter::IdIn(ids) => {
                if ids.is_empty() {
                    "0".to_string()
                } else {
                    let placeholders = vec!["?"; ids.len()].join(", ");
                    for id in ids {
                        params.push(SqlValue::Text(id.to_string()));
                    }
                    format!("{ITEM_ALIAS}.id IN ({placeholders})")
                }
            }
            Filter::AlwaysFalse => "0".to_string(),
        })
    }

    fn resolve(&self, attr: &AttributeRef) -> Result<(AspectMetadata, AttributeSpec)> {
        let metadata = self.manager.metadata(attr.aspect)?;
        let spec = metadata
            .attribute(&attr.attribute)
            .ok_or_else(|| crate::error::LibraryError::UnknownAttribute {
                aspect: attr.aspect,
                attribute: attr.attribute.clone(),
            })?
            .clone();
        Ok((metadata, spec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aspect::{AspectMetadata, AttributeType};
    use crate::query::filter::CompareOp;
    use crate::sqlite_schema::CORE_VERSIONED_SCHEMAS;
    use crate::resource_path::ResourcePath;
    use uuid::Uuid;

    const MOVIE_ASPECT: u128 = 0xA1;
    const AUDIO_ASPECT: u128 = 0xA2;

    fn movie_aspect() -> AspectMetadata {
        AspectMetadata::new(
            AspectId(Uuid::from_u128(MOVIE_ASPECT)),
            "movie",
            vec![
                AttributeSpec::single("title", AttributeType::text(200)),
                AttributeSpec::single("year", AttributeType::Integer),
                AttributeSpec::single("plot", AttributeType::large_text()),
                AttributeSpec::multi("actors", AttributeType::text(100)),
            ],
        )
    }

    fn audio_aspect() -> AspectMetadata {
        AspectMetadata::new(
            AspectId(Uuid::from_u128(AUDIO_ASPECT)),
            "audio",
            vec![AttributeSpec::single("artist", AttributeType::text(2))],
        )
    }

    struct Fixture {
        conn: Connection,
        manager: AspectStorageManager,
    }

    impl Fixture {
        fn new() -> Self {
            let conn = Connection::open_in_memory().unwrap();
            conn.pragma_update(None, "foreign_keys", "ON").unwrap();
            CORE_VERSIONED_SCHEMAS[0].create(&conn).unwrap();
            let manager = AspectStorageManager::new();
            manager
                .add_storage(&conn, crate::aspect::provider_resource())
                .unwrap();
            manager.add_storage(&conn, movie_aspect()).unwrap();
            manager.add_storage(&conn, audio_aspect()).unwrap();
            Fixture { conn, manager }
        }

        fn add_movie(&self, path: &str, title: &str, year: i64, actors: &[&str]) -> MediaItemId {
            let id = MediaItemId::new();
            self.conn
                .execute(
                    "INSERT INTO media_items (id) VALUES (?1)",
                    params![id.to_string()],
                )
                .unwrap();
            let provider = ProviderResourceAspect::instance(
                "local",
                &ResourcePath::new("fs", path),
            );
            self.manager
                .add_or_update(&self.conn, id, &provider, true)
                .unwrap();
            let movie = AspectInstance::new(movie_aspect().id)
                .set("title", title)
                .set("year", year)
                .set_multi(
                    "actors",
                    actors.iter().map(|a| AttributeValue::from(*a)).collect(),
                );
            self.manager
                .add_or_update(&self.conn, id, &movie, true)
                .unwrap();
            id
        }

        fn compiler(&self) -> QueryCompiler<'_> {
            QueryCompiler::new(&self.manager)
        }
    }

    fn title_attr() -> AttributeRef {
        AttributeRef::new(AspectId(Uuid::from_u128(MOVIE_ASPECT)), "title")
    }

    #[test]
    fn necessary_aspect_excludes_items_missing_it() {
        let fx = Fixture::new();
        fx.add_movie("/m/a.mkv", "Alien", 1979, &[]);
        // Item with provider resource only, no movie aspect.
        let bare = MediaItemId::new();
        fx.conn
            .execute(
                "INSERT INTO media_items (id) VALUES (?1)",
                params![bare.to_string()],
            )
            .unwrap();
        fx.manager
            .add_or_update(
                &fx.conn,
                bare,
                &ProviderResourceAspect::instance("local", &ResourcePath::new("fs", "/m/b.mkv")),
                true,
            )
            .unwrap();

        let items = fx
            .compiler()
            .execute(
                &fx.conn,
                &MediaQuery::new(vec![movie_aspect().id], vec![], None),
            )
            .unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn optional_aspect_attaches_when_present_without_excluding() {
        let fx = Fixture::new();
        let with_movie = fx.add_movie("/m/a.mkv", "Alien", 1979, &[]);
        let bare = MediaItemId::new();
        fx.conn
            .execute(
                "INSERT INTO media_items (id) VALUES (?1)",
                params![bare.to_string()],
            )
            .unwrap();
        fx.manager
            .add_or_update(
                &fx.conn,
                bare,
                &ProviderResourceAspect::instance("local", &ResourcePath::new("fs", "/m/b.mkv")),
                true,
            )
            .unwrap();

        let items = fx
            .compiler()
            .execute(
                &fx.conn,
                &MediaQuery::new(vec![], vec![movie_aspect().id], None),
            )
            .unwrap();
        assert_eq!(items.len(), 2);
        let movie_item = items.iter().find(|i| i.id == with_movie).unwrap();
        assert!(movie_item.aspect(movie_aspect().id).is_some());
        let bare_item = items.iter().find(|i| i.id == bare).unwrap();
        assert!(bare_item.aspect(movie_aspect().id).is_none());
    }

    #[test]
    fn provider_aspect_is_joined_but_stripped_when_not_requested() {
        let fx = Fixture::new();
        fx.add_movie("/m/a.mkv", "Alien", 1979, &[]);
        let items = fx
            .compiler()
            .execute(
                &fx.conn,
                &MediaQuery::new(vec![movie_aspect().id], vec![], None),
            )
            .unwrap();
        assert!(items[0].aspect(ProviderResourceAspect::ASPECT_ID).is_none());

        let with_provider = fx
            .compiler()
            .execute(
                &fx.conn,
                &MediaQuery::new(
                    vec![movie_aspect().id, ProviderResourceAspect::ASPECT_ID],
                    vec![],
                    None,
                ),
            )
            .unwrap();
        assert!(with_provider[0]
            .aspect(ProviderResourceAspect::ASPECT_ID)
            .is_some());
    }

    #[test]
    fn comparison_filter_restricts_results() {
        let fx = Fixture::new();
        fx.add_movie("/m/a.mkv", "Alien", 1979, &[]);
        fx.add_movie("/m/b.mkv", "Blade Runner", 1982, &[]);

        let filter = Filter::Compare {
            attr: AttributeRef::new(movie_aspect().id, "year"),
            op: CompareOp::Gt,
            value: AttributeValue::Integer(1980),
        };
        let items = fx
            .compiler()
            .execute(
                &fx.conn,
                &MediaQuery::new(vec![movie_aspect().id], vec![], Some(filter)),
            )
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0]
                .aspect(movie_aspect().id)
                .unwrap()
                .get("title")
                .unwrap()
                .as_text(),
            Some("Blade Runner")
        );
    }

    #[test]
    fn filter_only_aspect_joins_without_attaching() {
        let fx = Fixture::new();
        fx.add_movie("/m/a.mkv", "Alien", 1979, &[]);

        let filter = Filter::eq(title_attr(), "Alien");
        let items = fx
            .compiler()
            .execute(&fx.conn, &MediaQuery::new(vec![], vec![], Some(filter)))
            .unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].aspect(movie_aspect().id).is_none());
    }

    #[test]
    fn multi_value_comparison_uses_membership() {
        let fx = Fixture::new();
        fx.add_movie("/m/a.mkv", "Alien", 1979, &["Weaver"]);
        fx.add_movie("/m/b.mkv", "Blade Runner", 1982, &["Ford", "Hauer"]);

        let filter = Filter::eq(
            AttributeRef::new(movie_aspect().id, "actors"),
            "Ford",
        );
        let items = fx
            .compiler()
            .execute(
                &fx.conn,
                &MediaQuery::new(vec![movie_aspect().id], vec![], Some(filter)),
            )
            .unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn like_matches_escaped_literal_wildcards() {
        let fx = Fixture::new();
        fx.add_movie("/m/a.mkv", "100% Wolf", 2020, &[]);
        fx.add_movie("/m/b.mkv", "1000 Ways", 2021, &[]);

        let filter = Filter::contains(title_attr(), "100%");
        let items = fx
            .compiler()
            .execute(
                &fx.conn,
                &MediaQuery::new(vec![movie_aspect().id], vec![], Some(filter)),
            )
            .unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn always_false_and_empty_id_set_match_nothing() {
        let fx = Fixture::new();
        fx.add_movie("/m/a.mkv", "Alien", 1979, &[]);

        for filter in [Filter::AlwaysFalse, Filter::IdIn(vec![])] {
            let items = fx
                .compiler()
                .execute(
                    &fx.conn,
                    &MediaQuery::new(vec![movie_aspect().id], vec![], Some(filter)),
                )
                .unwrap();
            assert!(items.is_empty());
        }
    }

    #[test]
    fn id_set_filter_selects_exactly_those_items() {
        let fx = Fixture::new();
        let a = fx.add_movie("/m/a.mkv", "Alien", 1979, &[]);
        let _b = fx.add_movie("/m/b.mkv", "Blade Runner", 1982, &[]);

        let items = fx
            .compiler()
            .execute(
                &fx.conn,
                &MediaQuery::new(vec![movie_aspect().id], vec![], Some(Filter::IdIn(vec![a]))),
            )
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, a);
    }

    #[test]
    fn boolean_combinations_translate() {
        let fx = Fixture::new();
        fx.add_movie("/m/a.mkv", "Alien", 1979, &[]);
        fx.add_movie("/m/b.mkv", "Aliens", 1986, &[]);
        fx.add_movie("/m/c.mkv", "Blade Runner", 1982, &[]);

        let filter = Filter::and([
            Filter::starts_with(title_attr(), "Alien"),
            Filter::not(Filter::eq(
                AttributeRef::new(movie_aspect().id, "year"),
                1979i64,
            )),
        ]);
        let items = fx
            .compiler()
            .execute(
                &fx.conn,
                &MediaQuery::new(vec![movie_aspect().id], vec![], Some(filter)),
            )
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0]
                .aspect(movie_aspect().id)
                .unwrap()
                .get("year")
                .unwrap()
                .as_integer(),
            Some(1986)
        );
    }

    #[test]
    fn text_search_skips_large_and_short_bounded_attributes() {
        let fx = Fixture::new();
        let filter = fx
            .compiler()
            .text_search_filter("alien", &[], false)
            .unwrap();
        // Eligible: movie.title, provider path/system... but not plot
        // (large), not audio.artist (max_len 2 < 5), not actors? actors
        // max_len 100 -> eligible.
        let Filter::Or(likes) = &filter else {
            panic!("expected OR of likes, got {filter:?}");
        };
        let referenced: Vec<String> = likes
            .iter()
            .map(|f| match f {
                Filter::Like { attr, .. } => attr.attribute.clone(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert!(referenced.contains(&"title".to_string()));
        assert!(referenced.contains(&"actors".to_string()));
        assert!(!referenced.contains(&"plot".to_string()));
        assert!(!referenced.contains(&"artist".to_string()));

        let with_large = fx
            .compiler()
            .text_search_filter("alien", &[], true)
            .unwrap();
        let Filter::Or(likes) = &with_large else {
            panic!();
        };
        assert!(likes.iter().any(
            |f| matches!(f, Filter::Like { attr, .. } if attr.attribute == "plot")
        ));
    }

    #[test]
    fn empty_search_term_short_circuits_to_false() {
        let fx = Fixture::new();
        assert_eq!(
            fx.compiler().text_search_filter("   ", &[], false).unwrap(),
            Filter::AlwaysFalse
        );
    }

    #[test]
    fn value_distribution_counts_items_per_value() {
        let fx = Fixture::new();
        fx.add_movie("/m/a.mkv", "Alien", 1979, &[]);
        fx.add_movie("/m/b.mkv", "Aliens", 1986, &[]);
        fx.add_movie("/m/c.mkv", "Alien", 1979, &[]);

        let distribution = fx
            .compiler()
            .execute_value_distribution(&fx.conn, &title_attr(), None)
            .unwrap();
        let alien = distribution
            .iter()
            .find(|(v, _)| v.as_ref().and_then(|v| v.as_text()) == Some("Alien"))
            .unwrap();
        assert_eq!(alien.1, 2);
    }

    #[test]
    fn value_distribution_rejects_multi_value_attributes() {
        let fx = Fixture::new();
        let attr = AttributeRef::new(movie_aspect().id, "actors");
        assert!(fx
            .compiler()
            .execute_value_distribution(&fx.conn, &attr, None)
            .is_err());
    }
}
