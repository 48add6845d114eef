// rest_api/tests/api.rs
// Drives the router over real HTTP on an ephemeral port.

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

use lib::{Database, InMemoryStorage};
use rest_api::{router, AppState};
use security::{JwtKeys, RolesConfig, DEFAULT_TOKEN_TTL};

const SECRET: &[u8] = b"integration-test-secret-0123456789abcdef";
const ROOT_EMAIL: &str = "root@portal.ng";
const ROOT_PASSWORD: &str = "root-pass";

struct TestApp {
    base: String,
    client: Client,
}

impl TestApp {
    async fn spawn() -> Self {
        let db = Database::new(Arc::new(InMemoryStorage::new())).with_hash_cost(4);
        db.create_global_admin("root", ROOT_EMAIL, ROOT_PASSWORD).await.unwrap();
        let keys = JwtKeys::new(SECRET, DEFAULT_TOKEN_TTL).unwrap();
        let app = router(AppState::new(db, RolesConfig::default(), keys));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestApp { base: format!("http://{}", addr), client: Client::new() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self.send(reqwest::Method::POST, "/api/auth/login", None, Some(json!({
            "email": email,
            "password": password,
        })))
        .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = self.client.request(method, self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.unwrap();
        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.send(reqwest::Method::GET, path, Some(token), None).await
    }

    async fn post(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, path, Some(token), Some(body)).await
    }

    async fn put(&self, path: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(reqwest::Method::PUT, path, Some(token), body).await
    }

    async fn delete(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.send(reqwest::Method::DELETE, path, Some(token), None).await
    }

    /// Registers a facility as the global admin and logs its admin in.
    async fn facility(&self, root: &str, name: &str, kind: &str, admin: &str) -> (String, String) {
        let email = format!("{}@portal.ng", admin);
        let (status, body) = self
            .post(
                "/api/admin/facilities/register",
                root,
                json!({
                    "name": name,
                    "type": kind,
                    "location": "Ibadan",
                    "admin": { "username": admin, "email": email, "password": "admin-pass" },
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "facility registration failed: {body}");
        let id = body["facility"]["id"].as_str().unwrap().to_string();
        (id, self.login(&email, "admin-pass").await)
    }

    async fn staff(&self, facility_admin: &str, username: &str, role: &str) -> String {
        let email = format!("{}@portal.ng", username);
        let (status, body) = self
            .post(
                "/api/facility/staff/register",
                facility_admin,
                json!({ "username": username, "email": email, "password": "staff-pass", "role": role }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "staff registration failed: {body}");
        self.login(&email, "staff-pass").await
    }
}

fn patient_body(name: &str, refills: u32) -> Value {
    json!({
        "name": name,
        "gender": "female",
        "bloodType": "O+",
        "allergies": "Penicillin, Dust",
        "chronicConditions": ["Sickle Cell"],
        "currentInfections": "Malaria",
        "currentMedications": [{
            "name": "Hydroxyurea",
            "prescribedQuantity": 30,
            "prescribedBy": "Dr. Okafor",
            "dosage": { "amount": "500mg", "frequency": "daily", "instructions": "with water" },
            "refillable": refills > 0,
            "refillsLeft": refills,
        }],
    })
}

#[tokio::test]
async fn should_answer_health_without_token() {
    let app = TestApp::spawn().await;
    let (status, body) = app.send(reqwest::Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn should_reject_missing_and_forged_tokens() {
    let app = TestApp::spawn().await;
    let (status, body) = app.send(reqwest::Method::GET, "/api/admin/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Unauthorized: No token provided");

    let forged = JwtKeys::new(b"some-other-secret-some-other-secret!", DEFAULT_TOKEN_TTL).unwrap();
    let claims = security::Claims {
        sub: uuid::Uuid::new_v4(),
        role: models::medical::Role::Admin,
        facility_id: None,
        iat: 0,
        exp: u64::MAX / 2,
    };
    let token = forged.encode_claims(&claims).unwrap();
    let (status, _) = app.get("/api/admin/users", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn should_refuse_bad_credentials() {
    let app = TestApp::spawn().await;
    let (status, body) = app
        .send(
            reqwest::Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": ROOT_EMAIL, "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid email or password");
}

#[tokio::test]
async fn should_never_leak_password_hashes() {
    let app = TestApp::spawn().await;
    let root = app.login(ROOT_EMAIL, ROOT_PASSWORD).await;
    let (status, body) = app.get("/api/admin/users", &root).await;
    assert_eq!(status, StatusCode::OK);
    let users = body.as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert!(users[0].get("passwordHash").is_none());
    assert!(users[0].get("password").is_none());
}

#[tokio::test]
async fn should_run_prescription_lifecycle() {
    let app = TestApp::spawn().await;
    let root = app.login(ROOT_EMAIL, ROOT_PASSWORD).await;
    let (_, hospital_admin) = app.facility(&root, "Unity Hospital", "hospital", "unity").await;
    let (_, pharmacy_admin) = app.facility(&root, "Green Cross", "pharmacy", "greencross").await;
    let provider = app.staff(&hospital_admin, "dr-okafor", "provider").await;
    let pharmacist = app.staff(&pharmacy_admin, "pharm-ade", "pharmacy").await;

    let (status, body) = app.post("/api/patients/register", &hospital_admin, patient_body("Zainab Yusuf", 1)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let patient_id = body["patient"]["patientId"].as_str().unwrap().to_string();
    assert!(patient_id.starts_with("PT-") && patient_id.len() == 11);
    assert_eq!(body["patient"]["allergies"], json!(["Penicillin", "Dust"]));

    // public card
    let (status, card) =
        app.send(reqwest::Method::GET, &format!("/api/patients/{}/public", patient_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(card["name"], "Zainab Yusuf");
    assert!(card.get("currentMedications").is_none());
    assert!(card.get("currentInfections").is_none());

    // search
    let (status, found) = app.get("/api/patients?search=zai", &pharmacist).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found.as_array().unwrap().len(), 1);

    // provider edits, pharmacist may not
    let path = format!("/api/patients/{}", patient_id);
    let (status, updated) = app.put(&path, &provider, Some(json!({ "currentInfections": [] }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["currentInfections"], json!([]));
    let (status, _) = app.put(&path, &pharmacist, Some(json!({ "bloodType": "A+" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // dispense: the single refill is consumed, then the medication is locked
    let dispense = format!("/api/patients/{}/medications/hydroxyurea/dispense", patient_id);
    let (status, _) = app.put(&dispense, &provider, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.put(&dispense, &pharmacist, None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["medication"]["dispensed"], true);
    assert_eq!(body["medication"]["refillsLeft"], 0);
    assert_eq!(body["medication"]["refillable"], false);

    let (status, body) = app.put(&dispense, &pharmacist, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, _) = app
        .put(&format!("/api/patients/{}/medications/aspirin/dispense", patient_id), &pharmacist, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn should_restrict_patient_registration_to_hospitals() {
    let app = TestApp::spawn().await;
    let root = app.login(ROOT_EMAIL, ROOT_PASSWORD).await;
    let (_, pharmacy_admin) = app.facility(&root, "Green Cross", "pharmacy", "greencross").await;

    let (status, _) = app.post("/api/patients/register", &pharmacy_admin, patient_body("John Doe", 0)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // the global admin holds no patient permissions
    let (status, _) = app.post("/api/patients/register", &root, patient_body("John Doe", 0)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn should_validate_staff_and_facility_input() {
    let app = TestApp::spawn().await;
    let root = app.login(ROOT_EMAIL, ROOT_PASSWORD).await;
    let (_, hospital_admin) = app.facility(&root, "Unity Hospital", "hospital", "unity").await;

    let (status, body) = app
        .post(
            "/api/facility/staff/register",
            &hospital_admin,
            json!({ "username": "x", "email": "x@portal.ng", "password": "p", "role": "admin" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid staff role");

    let (status, _) = app
        .post(
            "/api/admin/facilities/register",
            &root,
            json!({
                "name": "Copycat",
                "type": "hospital",
                "location": "Ibadan",
                "admin": { "username": "copycat", "email": "UNITY@portal.ng", "password": "pw" },
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post("/api/admin/facilities/register", &root, json!({ "name": "No admin", "type": "hospital" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Facility and admin info are required");

    let (status, facilities) = app.get("/api/admin/facilities", &root).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(facilities.as_array().unwrap().len(), 1);
    assert_eq!(facilities[0]["adminEmail"], "unity@portal.ng");
}

#[tokio::test]
async fn should_scope_facility_admins() {
    let app = TestApp::spawn().await;
    let root = app.login(ROOT_EMAIL, ROOT_PASSWORD).await;
    let (unity_id, unity_admin) = app.facility(&root, "Unity Hospital", "hospital", "unity").await;
    let (other_id, _) = app.facility(&root, "Green Cross", "pharmacy", "greencross").await;
    app.staff(&unity_admin, "dr-okafor", "provider").await;

    let (status, body) = app.get(&format!("/api/facility/{}", unity_id), &unity_admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["facility"]["type"], "hospital");

    let (status, _) = app.get(&format!("/api/facility/{}", other_id), &unity_admin).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get(&format!("/api/facility/staff/by-facility/{}", unity_id), &unity_admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["staff"].as_array().unwrap().len(), 1);

    let (status, _) = app.get(&format!("/api/facility/{}", uuid::Uuid::new_v4()), &root).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn should_cascade_facility_deletion() {
    let app = TestApp::spawn().await;
    let root = app.login(ROOT_EMAIL, ROOT_PASSWORD).await;
    let (unity_id, unity_admin) = app.facility(&root, "Unity Hospital", "hospital", "unity").await;
    app.staff(&unity_admin, "dr-okafor", "provider").await;
    app.staff(&unity_admin, "nurse-bisi", "provider").await;

    let (status, body) = app.delete(&format!("/api/admin/facility/{}", unity_id), &root).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deletedUsers"], 3);

    let (_, users) = app.get("/api/admin/users", &root).await;
    let users = users.as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["role"], "admin");

    let (status, _) = app
        .send(
            reqwest::Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "dr-okafor@portal.ng", "password": "staff-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.delete(&format!("/api/admin/facility/{}", unity_id), &root).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn should_delete_only_own_staff() {
    let app = TestApp::spawn().await;
    let root = app.login(ROOT_EMAIL, ROOT_PASSWORD).await;
    let (unity_id, unity_admin) = app.facility(&root, "Unity Hospital", "hospital", "unity").await;
    let (_, other_admin) = app.facility(&root, "Mercy Clinic", "hospital", "mercy").await;
    app.staff(&unity_admin, "dr-okafor", "provider").await;

    let (_, body) = app.get(&format!("/api/facility/staff/by-facility/{}", unity_id), &unity_admin).await;
    let staff_id = body["staff"][0]["id"].as_str().unwrap().to_string();

    let (status, _) = app.delete(&format!("/api/facility/staff/{}", staff_id), &other_admin).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.delete(&format!("/api/facility/staff/{}", staff_id), &unity_admin).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.delete(&format!("/api/facility/staff/{}", staff_id), &unity_admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn should_never_dispense_non_refillable_twice() {
    let app = TestApp::spawn().await;
    let root = app.login(ROOT_EMAIL, ROOT_PASSWORD).await;
    let (_, hospital_admin) = app.facility(&root, "Unity Hospital", "hospital", "unity").await;
    let (_, pharmacy_admin) = app.facility(&root, "Green Cross", "pharmacy", "greencross").await;
    let provider = app.staff(&hospital_admin, "dr-okafor", "provider").await;
    let pharmacist = app.staff(&pharmacy_admin, "pharm-ade", "pharmacy").await;

    let stray_refills = json!({
        "name": "Tramadol",
        "prescribedQuantity": 10,
        "prescribedBy": "Dr. Okafor",
        "dosage": { "amount": "50mg", "frequency": "2x daily", "instructions": "with food" },
        "refillable": false,
        "refillsLeft": 2,
        "dispensed": true,
    });

    let mut body = patient_body("Zainab Yusuf", 0);
    body["currentMedications"] = json!([stray_refills.clone()]);
    let (status, body) = app.post("/api/patients/register", &hospital_admin, body).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["patient"]["currentMedications"][0]["refillsLeft"], 0);
    let patient_id = body["patient"]["patientId"].as_str().unwrap().to_string();

    let dispense = format!("/api/patients/{}/medications/tramadol/dispense", patient_id);
    let (status, _) = app.put(&dispense, &pharmacist, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // the same state submitted through an edit is locked as well
    let path = format!("/api/patients/{}", patient_id);
    let (status, _) = app.put(&path, &provider, Some(json!({ "currentMedications": [stray_refills] }))).await;
    assert_eq!(status, StatusCode::OK);
    for _ in 0..3 {
        let (status, _) = app.put(&dispense, &pharmacist, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn should_answer_not_found_for_malformed_ids() {
    let app = TestApp::spawn().await;
    let root = app.login(ROOT_EMAIL, ROOT_PASSWORD).await;
    let (_, hospital_admin) = app.facility(&root, "Unity Hospital", "hospital", "unity").await;

    let (status, _) = app.delete("/api/admin/facility/not-a-uuid", &root).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get("/api/facility/not-a-uuid", &hospital_admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete("/api/facility/staff/12345", &hospital_admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.send(reqwest::Method::GET, "/api/patients/..%2Fx/public", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get("/api/patients/PT%20bad!", &hospital_admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
