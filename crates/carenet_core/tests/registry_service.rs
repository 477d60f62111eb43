use carenet_core::db::open_db_in_memory;
use carenet_core::{
    AssociationManager, CreateFacilityRequest, CreateIndividualRequest, DeleteFacilityRequest,
    DeleteIndividualRequest, Facility, FacilityId, Individual, IndividualId,
    ListFacilitiesOfIndividualRequest, ListIndividualsOfFacilityRequest, ModifyFacilityRequest,
    ModifyIndividualRequest, RecordRef, RecordStore, RegisterRequest, RegistryError,
    RegistryService, RepoError, RepoResult, SqliteRecordStore,
};
use std::cell::Cell;

fn service() -> RegistryService<SqliteRecordStore> {
    let store = SqliteRecordStore::try_new(open_db_in_memory().unwrap()).unwrap();
    RegistryService::new(store, AssociationManager::new())
}

fn facility(service: &RegistryService<impl RecordStore>, name: &str) -> Facility {
    service
        .create_facility(&CreateFacilityRequest {
            name: name.to_string(),
        })
        .unwrap()
}

fn individual(service: &RegistryService<impl RecordStore>, name: &str) -> Individual {
    service
        .create_individual(&CreateIndividualRequest {
            name: name.to_string(),
        })
        .unwrap()
}

fn register(service: &RegistryService<impl RecordStore>, f: FacilityId, i: IndividualId) {
    service
        .register(&RegisterRequest {
            facility_id: f,
            individual_id: i,
        })
        .unwrap();
}

fn individuals_of(service: &RegistryService<impl RecordStore>, f: FacilityId) -> Vec<Individual> {
    service
        .list_individuals_of_facility(&ListIndividualsOfFacilityRequest { facility_id: f })
        .unwrap()
}

fn facilities_of(service: &RegistryService<impl RecordStore>, i: IndividualId) -> Vec<Facility> {
    service
        .list_facilities_of_individual(&ListFacilitiesOfIndividualRequest { individual_id: i })
        .unwrap()
}

#[test]
fn hospital_scenario_register_list_and_delete() {
    let service = service();
    let hospital = facility(&service, "General Hospital");
    let john = individual(&service, "John Doe");
    assert_eq!(hospital.id, FacilityId(1));
    assert_eq!(john.id, IndividualId(1));

    register(&service, hospital.id, john.id);
    let listed = individuals_of(&service, hospital.id);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, IndividualId(1));
    assert_eq!(listed[0].name, "John Doe");

    service
        .delete_facility(&DeleteFacilityRequest { id: hospital.id })
        .unwrap();
    assert!(facilities_of(&service, john.id).is_empty());
}

#[test]
fn create_accepts_empty_names_and_assigns_increasing_ids() {
    let service = service();
    let first = facility(&service, "");
    let second = facility(&service, "");
    assert_eq!(first.name, "");
    assert!(second.id > first.id);
    assert!(first.individual_ids.is_empty());
}

#[test]
fn register_is_visible_from_both_sides() {
    let service = service();
    let north = facility(&service, "North");
    let south = facility(&service, "South");
    let jane = individual(&service, "Jane Roe");

    register(&service, north.id, jane.id);
    register(&service, south.id, jane.id);

    let facility_names: Vec<String> = facilities_of(&service, jane.id)
        .into_iter()
        .map(|facility| facility.name)
        .collect();
    assert_eq!(facility_names, vec!["North".to_string(), "South".to_string()]);
    assert_eq!(individuals_of(&service, north.id)[0].id, jane.id);
    assert_eq!(individuals_of(&service, south.id)[0].id, jane.id);
}

#[test]
fn registering_twice_matches_registering_once() {
    let service = service();
    let hospital = facility(&service, "General Hospital");
    let john = individual(&service, "John Doe");

    register(&service, hospital.id, john.id);
    let once_facility = service.get_facility(hospital.id).unwrap().unwrap();
    let once_individual = service.get_individual(john.id).unwrap().unwrap();

    register(&service, hospital.id, john.id);
    assert_eq!(service.get_facility(hospital.id).unwrap().unwrap(), once_facility);
    assert_eq!(service.get_individual(john.id).unwrap().unwrap(), once_individual);
}

#[test]
fn delete_individual_detaches_from_every_facility() {
    let service = service();
    let north = facility(&service, "North");
    let south = facility(&service, "South");
    let john = individual(&service, "John Doe");
    let jane = individual(&service, "Jane Roe");
    register(&service, north.id, john.id);
    register(&service, south.id, john.id);
    register(&service, south.id, jane.id);

    service
        .delete_individual(&DeleteIndividualRequest { id: john.id })
        .unwrap();

    assert!(individuals_of(&service, north.id).is_empty());
    let remaining: Vec<IndividualId> = individuals_of(&service, south.id)
        .into_iter()
        .map(|individual| individual.id)
        .collect();
    assert_eq!(remaining, vec![jane.id]);
    assert!(service.get_individual(john.id).unwrap().is_none());
}

#[test]
fn modify_renames_and_keeps_associations() {
    let service = service();
    let hospital = facility(&service, "General Hospital");
    let john = individual(&service, "John Doe");
    register(&service, hospital.id, john.id);

    let renamed = service
        .modify_facility(&ModifyFacilityRequest {
            id: hospital.id,
            name: "St. Mary".to_string(),
        })
        .unwrap();
    assert_eq!(renamed.name, "St. Mary");
    assert_eq!(renamed.individual_ids, vec![john.id]);

    let renamed = service
        .modify_individual(&ModifyIndividualRequest {
            id: john.id,
            name: "Johnny Doe".to_string(),
        })
        .unwrap();
    assert_eq!(renamed.name, "Johnny Doe");
    assert_eq!(individuals_of(&service, hospital.id)[0].name, "Johnny Doe");
}

#[test]
fn modify_missing_facility_returns_not_found() {
    let service = service();
    let err = service
        .modify_facility(&ModifyFacilityRequest {
            id: FacilityId(999),
            name: "X".to_string(),
        })
        .unwrap_err();
    assert!(matches!(
        err,
        RegistryError::NotFound { ref missing } if missing == &[RecordRef::Facility(FacilityId(999))]
    ));
    assert!(service.list_all_facilities().unwrap().is_empty());
}

#[test]
fn not_found_operations_change_nothing() {
    let service = service();
    let hospital = facility(&service, "General Hospital");
    let john = individual(&service, "John Doe");
    register(&service, hospital.id, john.id);
    let facilities_before = service.list_all_facilities().unwrap();
    let individuals_before = service.list_all_individuals().unwrap();

    assert!(service
        .delete_facility(&DeleteFacilityRequest { id: FacilityId(42) })
        .unwrap_err()
        .is_not_found());
    assert!(service
        .delete_individual(&DeleteIndividualRequest {
            id: IndividualId(42)
        })
        .unwrap_err()
        .is_not_found());
    assert!(service
        .modify_individual(&ModifyIndividualRequest {
            id: IndividualId(42),
            name: "ghost".to_string(),
        })
        .unwrap_err()
        .is_not_found());
    let err = service
        .register(&RegisterRequest {
            facility_id: hospital.id,
            individual_id: IndividualId(42),
        })
        .unwrap_err();
    assert_eq!(err.to_string(), "individual 42 not found");

    assert_eq!(service.list_all_facilities().unwrap(), facilities_before);
    assert_eq!(service.list_all_individuals().unwrap(), individuals_before);
}

#[test]
fn register_with_both_ids_missing_is_one_combined_failure() {
    let service = service();
    let err = service
        .register(&RegisterRequest {
            facility_id: FacilityId(1),
            individual_id: IndividualId(2),
        })
        .unwrap_err();
    assert_eq!(err.to_string(), "facility 1 and individual 2 not found");
}

#[test]
fn list_counterparts_of_missing_records_returns_not_found() {
    let service = service();
    assert!(service
        .list_individuals_of_facility(&ListIndividualsOfFacilityRequest {
            facility_id: FacilityId(3)
        })
        .unwrap_err()
        .is_not_found());
    assert!(service
        .list_facilities_of_individual(&ListFacilitiesOfIndividualRequest {
            individual_id: IndividualId(3)
        })
        .unwrap_err()
        .is_not_found());
}

#[test]
fn list_all_on_empty_store_returns_empty_sequences() {
    let service = service();
    assert!(service.list_all_individuals().unwrap().is_empty());
    assert!(service.list_all_facilities().unwrap().is_empty());
}

#[test]
fn list_all_returns_records_in_id_order() {
    let service = service();
    for name in ["a", "b", "c"] {
        individual(&service, name);
    }
    let names: Vec<String> = service
        .list_all_individuals()
        .unwrap()
        .into_iter()
        .map(|individual| individual.name)
        .collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

/// Store wrapper that fails individual updates on demand.
struct FlakyStore {
    inner: SqliteRecordStore,
    fail_individual_updates: Cell<bool>,
}

impl RecordStore for FlakyStore {
    fn get_facility(&self, id: FacilityId) -> RepoResult<Option<Facility>> {
        self.inner.get_facility(id)
    }

    fn get_individual(&self, id: IndividualId) -> RepoResult<Option<Individual>> {
        self.inner.get_individual(id)
    }

    fn insert_facility(&self, name: &str) -> RepoResult<Facility> {
        self.inner.insert_facility(name)
    }

    fn insert_individual(&self, name: &str) -> RepoResult<Individual> {
        self.inner.insert_individual(name)
    }

    fn update_facility(&self, facility: &Facility) -> RepoResult<Facility> {
        self.inner.update_facility(facility)
    }

    fn update_individual(&self, individual: &Individual) -> RepoResult<Individual> {
        if self.fail_individual_updates.get() {
            return Err(RepoError::InvalidData("injected failure".to_string()));
        }
        self.inner.update_individual(individual)
    }

    fn delete_facility(&self, id: FacilityId) -> RepoResult<()> {
        self.inner.delete_facility(id)
    }

    fn delete_individual(&self, id: IndividualId) -> RepoResult<()> {
        self.inner.delete_individual(id)
    }

    fn list_facilities(&self) -> RepoResult<Vec<Facility>> {
        self.inner.list_facilities()
    }

    fn list_individuals(&self) -> RepoResult<Vec<Individual>> {
        self.inner.list_individuals()
    }

    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<RepoError>,
    {
        self.inner.atomically(|_| work(self))
    }
}

#[test]
fn failed_detach_rolls_back_the_whole_delete() {
    let store = FlakyStore {
        inner: SqliteRecordStore::try_new(open_db_in_memory().unwrap()).unwrap(),
        fail_individual_updates: Cell::new(false),
    };
    let service = RegistryService::new(store, AssociationManager::new());
    let hospital = facility(&service, "General Hospital");
    let john = individual(&service, "John Doe");
    let jane = individual(&service, "Jane Roe");
    register(&service, hospital.id, john.id);
    register(&service, hospital.id, jane.id);

    service.store().fail_individual_updates.set(true);
    let err = service
        .delete_facility(&DeleteFacilityRequest { id: hospital.id })
        .unwrap_err();
    assert!(matches!(err, RegistryError::Store(RepoError::InvalidData(_))));
    service.store().fail_individual_updates.set(false);

    let kept = service.get_facility(hospital.id).unwrap().unwrap();
    assert_eq!(kept.individual_ids, vec![john.id, jane.id]);
    assert_eq!(facilities_of(&service, john.id)[0].id, hospital.id);
    assert_eq!(facilities_of(&service, jane.id)[0].id, hospital.id);
}

#[test]
fn failed_register_leaves_no_half_link() {
    let store = FlakyStore {
        inner: SqliteRecordStore::try_new(open_db_in_memory().unwrap()).unwrap(),
        fail_individual_updates: Cell::new(false),
    };
    let service = RegistryService::new(store, AssociationManager::new());
    let hospital = facility(&service, "General Hospital");
    let john = individual(&service, "John Doe");

    service.store().fail_individual_updates.set(true);
    assert!(service
        .register(&RegisterRequest {
            facility_id: hospital.id,
            individual_id: john.id,
        })
        .is_err());

    assert!(individuals_of(&service, hospital.id).is_empty());
    assert!(facilities_of(&service, john.id).is_empty());
}

#[test]
fn records_persist_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.sqlite3");
    {
        let store = SqliteRecordStore::try_new(carenet_core::db::open_db(&path).unwrap()).unwrap();
        let service = RegistryService::new(store, AssociationManager::new());
        let hospital = facility(&service, "General Hospital");
        let john = individual(&service, "John Doe");
        register(&service, hospital.id, john.id);
    }

    let store = SqliteRecordStore::try_new(carenet_core::db::open_db(&path).unwrap()).unwrap();
    let service = RegistryService::new(store, AssociationManager::new());
    let listed = individuals_of(&service, FacilityId(1));
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "John Doe");
}

fn file_service(path: &std::path::Path) -> RegistryService<SqliteRecordStore> {
    let store = SqliteRecordStore::try_new(carenet_core::db::open_db(path).unwrap()).unwrap();
    RegistryService::new(store, AssociationManager::new())
}

fn assert_links_are_mutual(service: &RegistryService<SqliteRecordStore>) {
    for individual in service.list_all_individuals().unwrap() {
        for facility_id in &individual.facility_ids {
            let facility = service
                .get_facility(*facility_id)
                .unwrap()
                .unwrap_or_else(|| panic!("{} lists missing facility {facility_id}", individual.id));
            assert!(facility.has_individual(individual.id));
        }
    }
    for facility in service.list_all_facilities().unwrap() {
        for individual_id in &facility.individual_ids {
            let individual = service.get_individual(*individual_id).unwrap().unwrap();
            assert!(individual.has_facility(facility.id));
        }
    }
}

#[test]
fn concurrent_register_and_delete_keep_links_mutual() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.sqlite3");
    let deleter = file_service(&path);
    let mut registrar = file_service(&path);
    let john = individual(&deleter, "John Doe");

    for round in 0..50 {
        let ward = facility(&deleter, &format!("ward {round}"));
        let start = std::sync::Barrier::new(2);

        let registered = std::thread::scope(|scope| {
            let registrar = &mut registrar;
            let start = &start;
            let handle = scope.spawn(move || {
                start.wait();
                registrar.register(&RegisterRequest {
                    facility_id: ward.id,
                    individual_id: john.id,
                })
            });

            start.wait();
            deleter
                .delete_facility(&DeleteFacilityRequest { id: ward.id })
                .unwrap();
            handle.join().unwrap()
        });

        if let Err(err) = registered {
            assert!(err.is_not_found(), "round {round}: {err}");
        }
        assert!(deleter.get_facility(ward.id).unwrap().is_none());
        assert_links_are_mutual(&deleter);
    }

    let john = deleter.get_individual(john.id).unwrap().unwrap();
    assert!(john.facility_ids.is_empty());
}
