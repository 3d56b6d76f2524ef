//! End-to-end tests for search, text search and grouping.

mod common;

use common::{path, TestLibrary, AUDIO_ASPECT_ID, MOVIE_ASPECT_ID};
use mediarium::aspect::AspectInstance;
use mediarium::query::{
    AttributeRef, Filter, FirstCharacterGrouping, MediaQuery, EMPTY_GROUP_NAME, MISC_GROUP_NAME,
};

fn title_attr() -> AttributeRef {
    AttributeRef::new(MOVIE_ASPECT_ID, "title")
}

fn titles(items: &[mediarium::MediaItem]) -> Vec<String> {
    let mut titles: Vec<String> = items
        .iter()
        .filter_map(|item| item.aspect(MOVIE_ASPECT_ID))
        .filter_map(|movie| movie.get("title"))
        .filter_map(|value| value.as_text().map(str::to_string))
        .collect();
    titles.sort();
    titles
}

#[test]
fn test_compare_filter_restricts_results() {
    let fixture = TestLibrary::open();
    fixture.add_movie("alien.mkv", "Alien", 1979);
    fixture.add_movie("blade_runner.mkv", "Blade Runner", 1982);

    let query = MediaQuery::new(
        vec![MOVIE_ASPECT_ID],
        vec![],
        Some(Filter::eq(
            AttributeRef::new(MOVIE_ASPECT_ID, "year"),
            1982i64,
        )),
    );
    let items = fixture.library.search(&query, false).unwrap();
    assert_eq!(titles(&items), vec!["Blade Runner"]);
}

#[test]
fn test_necessary_aspect_gates_optional_attaches() {
    let fixture = TestLibrary::open();
    fixture.add_movie("alien.mkv", "Alien", 1979);
    let scored = fixture.add_movie("tron.mkv", "Tron", 1982);
    fixture
        .library
        .add_or_update_item(
            &fixture.system_id,
            &path("/library/tron.mkv"),
            vec![AspectInstance::new(AUDIO_ASPECT_ID).set("artist", "Wendy Carlos")],
        )
        .unwrap();

    let query = MediaQuery::new(vec![MOVIE_ASPECT_ID], vec![AUDIO_ASPECT_ID], None);
    let items = fixture.library.search(&query, false).unwrap();
    assert_eq!(items.len(), 2);
    for item in &items {
        let audio = item.aspect(AUDIO_ASPECT_ID);
        if item.id == scored {
            assert_eq!(
                audio.unwrap().get("artist").unwrap().as_text(),
                Some("Wendy Carlos")
            );
        } else {
            assert!(audio.is_none());
        }
    }

    // Audio as necessary keeps only the scored movie.
    let query = MediaQuery::new(vec![MOVIE_ASPECT_ID, AUDIO_ASPECT_ID], vec![], None);
    let items = fixture.library.search(&query, false).unwrap();
    assert_eq!(titles(&items), vec!["Tron"]);
}

#[test]
fn test_text_search_is_case_insensitive_substring() {
    let fixture = TestLibrary::open();
    fixture.add_movie("alien.mkv", "Alien", 1979);
    fixture.add_movie("aliens.mkv", "Aliens", 1986);
    fixture.add_movie("tron.mkv", "Tron", 1982);

    let items = fixture
        .library
        .simple_text_search("aLiEn", &[MOVIE_ASPECT_ID], &[], None, false, false)
        .unwrap();
    assert_eq!(titles(&items), vec!["Alien", "Aliens"]);
}

#[test]
fn test_extra_filter_narrows_text_search() {
    let fixture = TestLibrary::open();
    fixture.add_movie("alien.mkv", "Alien", 1979);
    fixture.add_movie("aliens.mkv", "Aliens", 1986);

    let year_filter = Filter::eq(AttributeRef::new(MOVIE_ASPECT_ID, "year"), 1979i64);
    let items = fixture
        .library
        .simple_text_search(
            "alien",
            &[MOVIE_ASPECT_ID],
            &[],
            Some(year_filter),
            false,
            false,
        )
        .unwrap();
    assert_eq!(titles(&items), vec!["Alien"]);
}

#[test]
fn test_empty_or_blank_term_matches_nothing() {
    let fixture = TestLibrary::open();
    fixture.add_movie("alien.mkv", "Alien", 1979);

    for term in ["", "   ", "\t"] {
        let items = fixture
            .library
            .simple_text_search(term, &[MOVIE_ASPECT_ID], &[], None, false, false)
            .unwrap();
        assert!(items.is_empty(), "term {term:?} must match nothing");
    }
}

#[test]
fn test_large_text_searched_only_on_request() {
    let fixture = TestLibrary::open();
    fixture.add_movie_instance(
        "alien.mkv",
        AspectInstance::new(MOVIE_ASPECT_ID)
            .set("title", "Alien")
            .set("plot", "A xenomorph hunts the crew of the Nostromo."),
    );

    let without = fixture
        .library
        .simple_text_search("Nostromo", &[MOVIE_ASPECT_ID], &[], None, false, false)
        .unwrap();
    assert!(without.is_empty());

    let with = fixture
        .library
        .simple_text_search("Nostromo", &[MOVIE_ASPECT_ID], &[], None, true, false)
        .unwrap();
    assert_eq!(titles(&with), vec!["Alien"]);
}

#[test]
fn test_like_wildcards_in_terms_are_literal() {
    let fixture = TestLibrary::open();
    fixture.add_movie("percent.mkv", "100% Wolf", 2020);
    fixture.add_movie("other.mkv", "100x Wolf", 2020);

    let items = fixture
        .library
        .simple_text_search("100% W", &[MOVIE_ASPECT_ID], &[], None, false, false)
        .unwrap();
    assert_eq!(titles(&items), vec!["100% Wolf"]);
}

#[test]
fn test_first_character_grouping_buckets() {
    let fixture = TestLibrary::open();
    fixture.add_movie("alien.mkv", "Alien", 1979);
    fixture.add_movie("avatar.mkv", "avatar", 2009);
    fixture.add_movie("seven.mkv", "7 Samurai", 1954);
    fixture.add_movie("blank.mkv", "   ", 2000);
    fixture.add_movie("accent.mkv", "Édith", 2007);

    let groups = fixture
        .library
        .group_values(&title_attr(), None, &FirstCharacterGrouping::new(title_attr()))
        .unwrap();
    let summary: Vec<(&str, i64)> = groups
        .iter()
        .map(|group| (group.name.as_str(), group.count))
        .collect();
    assert_eq!(
        summary,
        vec![
            (MISC_GROUP_NAME, 1),
            ("7*", 1),
            (EMPTY_GROUP_NAME, 1),
            ("A*", 2),
        ]
    );
}

#[test]
fn test_group_filters_requery_their_members() {
    let fixture = TestLibrary::open();
    fixture.add_movie("alien.mkv", "Alien", 1979);
    fixture.add_movie("avatar.mkv", "avatar", 2009);
    fixture.add_movie("tron.mkv", "Tron", 1982);

    let groups = fixture
        .library
        .group_values(&title_attr(), None, &FirstCharacterGrouping::new(title_attr()))
        .unwrap();
    let bucket = groups.iter().find(|group| group.name == "A*").unwrap();
    let query = MediaQuery::new(
        vec![MOVIE_ASPECT_ID],
        vec![],
        Some(bucket.filter.clone().unwrap()),
    );
    let items = fixture.library.search(&query, false).unwrap();
    assert_eq!(titles(&items), vec!["Alien", "avatar"]);
    assert_eq!(items.len() as i64, bucket.count);
}

#[test]
fn test_multi_value_reimport_does_not_duplicate() {
    let fixture = TestLibrary::open();
    let genres = || {
        AspectInstance::new(MOVIE_ASPECT_ID)
            .set("title", "Alien")
            .set_multi(
                "genres",
                vec!["horror".into(), "sci-fi".into()],
            )
    };
    let first = fixture.add_movie_instance("alien.mkv", genres());
    let second = fixture.add_movie_instance("alien.mkv", genres());
    assert_eq!(first, second);

    let query = MediaQuery::new(vec![MOVIE_ASPECT_ID], vec![], None);
    let items = fixture.library.search(&query, false).unwrap();
    assert_eq!(items.len(), 1);
    let stored = items[0]
        .aspect(MOVIE_ASPECT_ID)
        .unwrap()
        .get_multi("genres")
        .unwrap();
    assert_eq!(stored.len(), 2);
}

#[test]
fn test_browse_returns_direct_children_only() {
    let fixture = TestLibrary::open();
    for file in ["a.mkv", "series", "series/pilot.mkv", "series/s2/e1.mkv"] {
        fixture
            .library
            .add_or_update_item(
                &fixture.system_id,
                &path(&format!("/library/{file}")),
                vec![],
            )
            .unwrap();
    }

    let children = fixture
        .library
        .browse(&fixture.system_id, &path("/library"), &[], &[])
        .unwrap();
    let mut paths: Vec<String> = children
        .iter()
        .filter_map(|item| item.resource_path())
        .map(|p| p.path().to_string())
        .collect();
    paths.sort();
    assert_eq!(paths, vec!["/library/a.mkv", "/library/series"]);

    let deeper = fixture
        .library
        .browse(&fixture.system_id, &path("/library/series"), &[], &[])
        .unwrap();
    assert_eq!(deeper.len(), 1);
}
