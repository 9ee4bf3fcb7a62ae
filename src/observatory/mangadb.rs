//! `mangadb`: MaNGA reduction bookkeeping
//!
//! Plates and exposures point back into `platedb`.

use super::{SchemaDefinition, PK};

pub static MANGADB: SchemaDefinition = SchemaDefinition {
    name: "mangadb",
    tables: &[
        table!("current_status", PK, &[]),
        table!(
            "plate",
            PK,
            &[fk!("platedb_plate_pk" => "platedb.plate")],
        ),
        table!("data_cube", PK, &[fk!("plate_pk" => "platedb.plate")]),
        table!("exposure_status", PK, &[]),
        table!("set_status", PK, &[]),
        table!("set", PK, &[fk!("set_status_pk" => "mangadb.set_status")]),
        table!(
            "exposure",
            PK,
            &[
                fk!("data_cube_pk" => "mangadb.data_cube"),
                fk!("exposure_status_pk" => "mangadb.exposure_status"),
                fk!("platedb_exposure_pk" => "platedb.exposure"),
                fk!("set_pk" => "mangadb.set"),
            ],
        ),
        table!(
            "exposure_to_data_cube",
            PK,
            &[
                fk!("data_cube_pk" => "mangadb.data_cube"),
                fk!("exposure_pk" => "mangadb.exposure"),
            ],
        ),
        table!("filelist", PK, &[]),
        table!(
            "sn2_values",
            PK,
            &[fk!("exposure_pk" => "mangadb.exposure")],
        ),
        table!(
            "spectrum",
            PK,
            &[
                fk!("data_cube_pk" => "mangadb.data_cube"),
                fk!("exposure_pk" => "mangadb.exposure"),
            ],
        ),
    ],
};
